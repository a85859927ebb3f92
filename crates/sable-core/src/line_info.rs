use serde::Serialize;

/// Line and column of an offset, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// Sorted line-start offsets of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    line_starts: Vec<usize>,
}

impl LineInfo {
    pub fn new(line_starts: Vec<usize>) -> Self {
        debug_assert!(line_starts.windows(2).all(|w| w[0] < w[1]));
        let line_starts = if line_starts.is_empty() {
            vec![0]
        } else {
            line_starts
        };
        Self { line_starts }
    }

    /// Compute line starts directly from text. `\r\n` counts as one break.
    pub fn from_text(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    starts.push(i + 1);
                }
                b'\n' => starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self::new(starts)
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn location(&self, offset: usize) -> Location {
        let index = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert - 1,
        };
        Location {
            line: index + 1,
            column: offset - self.line_starts[index] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_locations() {
        let info = LineInfo::from_text("ab\ncd\r\nef");
        assert_eq!(info.line_starts(), &[0, 3, 7]);
        assert_eq!(info.location(0), Location { line: 1, column: 1 });
        assert_eq!(info.location(4), Location { line: 2, column: 2 });
        assert_eq!(info.location(7), Location { line: 3, column: 1 });
        assert_eq!(info.location(100).line, 3);
    }

    #[test]
    fn test_empty_text_has_one_line() {
        let info = LineInfo::from_text("");
        assert_eq!(info.line_count(), 1);
        assert_eq!(info.location(0), Location { line: 1, column: 1 });
    }
}
