use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use wallpaper_finder_core::picker::Picker;
use wallpaper_finder_core::Result;

/// Asks on the terminal which staged files to keep.
///
/// `y` (or Enter) keeps the file, `n` drops it, `a` keeps it and every
/// remaining file, `q` drops it and every remaining file. End of input drops
/// whatever has not been answered.
pub struct PromptPicker<R, W> {
    input: R,
    output: W,
}

impl PromptPicker<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptPicker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Picker for PromptPicker<R, W> {
    fn pick(&mut self, staged: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut kept = Vec::new();
        if staged.is_empty() {
            return Ok(kept);
        }

        writeln!(self.output, "Review {} downloaded images:", staged.len())?;

        for (index, path) in staged.iter().enumerate() {
            loop {
                write!(
                    self.output,
                    "[{}/{}] keep {}? [Y/n/a/q] ",
                    index + 1,
                    staged.len(),
                    path.display()
                )?;
                self.output.flush()?;

                let mut answer = String::new();
                if self.input.read_line(&mut answer)? == 0 {
                    writeln!(self.output)?;
                    return Ok(kept);
                }

                match answer.trim().to_lowercase().as_str() {
                    "" | "y" | "yes" => {
                        kept.push(path.clone());
                        break;
                    }
                    "n" | "no" => break,
                    "a" | "all" => {
                        kept.extend(staged[index..].iter().cloned());
                        return Ok(kept);
                    }
                    "q" | "quit" => return Ok(kept),
                    _ => writeln!(self.output, "Please answer y, n, a or q")?,
                }
            }
        }

        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn staged() -> Vec<PathBuf> {
        ["a.png", "b.png", "c.png", "d.png"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    fn pick(answers: &str) -> Vec<PathBuf> {
        let mut output = Vec::new();
        let mut picker = PromptPicker::new(Cursor::new(answers.as_bytes()), &mut output);
        picker.pick(&staged()).unwrap()
    }

    #[test]
    fn test_yes_and_no() {
        assert_eq!(
            pick("y\nn\n\nno\n"),
            vec![PathBuf::from("a.png"), PathBuf::from("c.png")]
        );
    }

    #[test]
    fn test_keep_all_remaining() {
        assert_eq!(
            pick("n\na\n"),
            vec![
                PathBuf::from("b.png"),
                PathBuf::from("c.png"),
                PathBuf::from("d.png")
            ]
        );
    }

    #[test]
    fn test_quit_drops_remaining() {
        assert_eq!(pick("y\nq\n"), vec![PathBuf::from("a.png")]);
    }

    #[test]
    fn test_unknown_answer_asks_again() {
        let mut output = Vec::new();
        let kept = PromptPicker::new(Cursor::new(&b"maybe\ny\nq\n"[..]), &mut output)
            .pick(&staged())
            .unwrap();

        assert_eq!(kept, vec![PathBuf::from("a.png")]);
        assert!(String::from_utf8(output)
            .unwrap()
            .contains("Please answer y, n, a or q"));
    }

    #[test]
    fn test_end_of_input_drops_rest() {
        assert_eq!(pick("y\n"), vec![PathBuf::from("a.png")]);
    }
}
