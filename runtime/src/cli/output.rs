//! Output mode flags and terminal styling shared by all subcommands.
//!
//! `main` records the global `--json`, `--quiet` and `--no-color` flags in
//! environment variables so every command can check them without threading
//! them through.

use serde::Serialize;

pub fn is_json() -> bool {
    std::env::var_os("POLICYSCOPE_JSON").is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os("POLICYSCOPE_QUIET").is_some()
}

pub fn is_verbose() -> bool {
    std::env::var_os("POLICYSCOPE_VERBOSE").is_some()
}

fn use_color() -> bool {
    std::env::var_os("POLICYSCOPE_NO_COLOR").is_none() && std::env::var_os("NO_COLOR").is_none()
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// ANSI styles, disabled under `--no-color` or `NO_COLOR`.
pub struct Styles {
    color: bool,
}

impl Styles {
    pub fn detect() -> Self {
        Self { color: use_color() }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "✓")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "!")
    }

    pub fn err_sym(&self) -> String {
        self.paint("31", "✗")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    /// Color a 1-10 risk score green, yellow or red.
    pub fn risk(&self, score: u8) -> String {
        let code = match score {
            0..=3 => "32",
            4..=6 => "33",
            _ => "31",
        };
        self.paint(code, &format!("{score}/10"))
    }
}
