const INDENT: &str = "    ";

/// Line-oriented Python source builder.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    /// `# text` lines, one per comment line.
    pub(crate) fn comments(&mut self, lines: &[String]) {
        for line in lines {
            if line.is_empty() {
                self.line("#");
            } else {
                self.line(format!("# {line}"));
            }
        }
    }

    pub(crate) fn indent(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

/// Normalize generated text: no trailing whitespace, at most two blank
/// lines in a row, exactly one newline at the end.
pub(crate) fn post_process(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 2 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Writer, post_process};

    #[test]
    fn indentation_skips_empty_lines() {
        let mut w = Writer::default();
        w.line("class A:");
        w.indent();
        w.comments(&["note".to_string(), String::new()]);
        w.line("");
        w.line("pass");
        w.dedent();
        w.dedent();
        w.line("x = 1");
        assert_eq!(w.finish(), "class A:\n    # note\n    #\n\n    pass\nx = 1\n");
    }

    #[test]
    fn post_processing_normalizes_whitespace() {
        assert_eq!(
            post_process("\n\na = 1   \n\n\n\n\nb = 2\t\n\n\n"),
            "a = 1\n\n\nb = 2\n"
        );
        assert_eq!(post_process(""), "\n");
    }
}
