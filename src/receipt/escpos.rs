//! ESC/POS byte stream for 80mm/58mm thermal printers.

/// Fluent builder over raw ESC/POS commands.
///
/// Printers without a Tamil code page are assumed, so text is reduced to
/// ASCII: `₹` becomes `Rs.` and anything else outside ASCII becomes `?`.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Starts a job with ESC @ (initialise printer).
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf, width }
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        for ch in s.chars() {
            match ch {
                '₹' => self.buf.extend_from_slice(b"Rs."),
                c if c.is_ascii() => self.buf.push(c as u8),
                _ => self.buf.push(b'?'),
            }
        }
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width and height.
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    pub fn sep(&mut self, ch: char) -> &mut Self {
        let rule = ch.to_string().repeat(self.width);
        self.line(&rule)
    }

    /// Feeds `lines` then performs a full cut (GS V 66 n).
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
