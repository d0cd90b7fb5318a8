use std::io::{self, Write};

/// Front-end the peer reports to
pub trait ClientUi {
    fn show_server_message(&mut self, message: &str);
    fn show_client_message(&mut self, message: &str);
    fn show_network_status(&mut self, status: &str);
}

/// Line-per-message console front-end
pub struct TextUi<W: Write> {
    out: W,
}

impl TextUi<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TextUi<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        // A closed stdout leaves nothing to report to
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }
}

impl<W: Write> ClientUi for TextUi<W> {
    fn show_server_message(&mut self, message: &str) {
        self.write_line(message);
    }

    fn show_client_message(&mut self, message: &str) {
        self.write_line(&format!("Client message: {}", message));
    }

    fn show_network_status(&mut self, status: &str) {
        self.write_line(&format!("Network Status: {}", status));
    }
}
