/// Normalizes newlines in a byte stream to line feeds: `\r\n` and lone
/// `\r` both become `\n`. A trailing `\r` at a chunk boundary is held
/// back until the next chunk decides whether it opened a `\r\n` pair.
#[derive(Default)]
pub struct LineNormalizer {
    held_cr: bool,
}

impl LineNormalizer {
    pub fn new() -> LineNormalizer {
        LineNormalizer::default()
    }

    pub fn normalize(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(chunk.len() + 1);
        let mut bytes = chunk.iter().copied().peekable();

        if self.held_cr {
            output.push(b'\n');
            self.held_cr = false;

            // The held \r and this \n were one pair
            if chunk.first() == Some(&b'\n') {
                bytes.next();
            }
        }

        while let Some(byte) = bytes.next() {
            if byte == b'\r' {
                match bytes.peek() {
                    Some(b'\n') => {
                        bytes.next();
                        output.push(b'\n');
                    }
                    Some(_) => {
                        output.push(b'\n');
                    }
                    None => {
                        self.held_cr = true;
                    }
                }
            } else {
                output.push(byte);
            }
        }

        output
    }

    /// Flush a held trailing `\r` once the stream ends.
    pub fn finish(&mut self) -> Option<u8> {
        if self.held_cr {
            self.held_cr = false;

            Some(b'\n')
        } else {
            None
        }
    }
}
