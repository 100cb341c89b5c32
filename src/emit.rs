//! Indentation-aware text writer for generated code.

/// Line writer with tab indentation. Blocks always write their closing brace,
/// whatever the body returns.
#[derive(Debug, Default)]
pub struct Emitter {
    out: String,
    indent: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation. Empty lines carry no tabs.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    /// Write `header` (which opens a brace), the body one level deeper, then `}`.
    pub fn block<T>(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Emitter) -> T) -> T {
        self.line(header);
        let result = self.indented(body);
        self.line("}");
        result
    }

    /// Indent the body without opening a block (`case` bodies).
    pub fn indented<T>(&mut self, body: impl FnOnce(&mut Emitter) -> T) -> T {
        self.indent += 1;
        let result = body(self);
        self.indent -= 1;
        result
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_close_in_order() {
        let mut e = Emitter::new();
        e.block("a {", |e| {
            e.line("x;");
            e.block("b {", |e| {
                e.blank();
                Ok::<_, ()>(())
            })
        })
        .unwrap();
        assert_eq!(e.finish(), "a {\n\tx;\n\tb {\n\n\t}\n}\n");
    }

    #[test]
    fn block_closes_on_error() {
        let mut e = Emitter::new();
        let r: Result<(), &str> = e.block("if (x) {", |e| {
            e.line("y;");
            Err("boom")
        });
        assert!(r.is_err());
        assert_eq!(e.as_str(), "if (x) {\n\ty;\n}\n");
        e.line("after");
        assert!(e.as_str().ends_with("}\nafter\n"));
    }
}
