//! Terminal prompting for secret inputs.
//!
//! Prompts go to stderr so piped output stays clean. When stdin is a
//! terminal, echo is disabled around the read; otherwise lines are read as
//! plain text (which is how tests and scripted unlocks drive the binary).

use secrecy::SecretString;
use std::io::IsTerminal;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("io error")]
    Io(#[from] io::Error),
}

/// Prompt for a secret; an empty response means "skip this input".
pub fn prompt_secret(label: &str) -> Result<SecretString, PromptError> {
    eprint!("{label}");
    io::stderr().flush()?;

    if io::stdin().is_terminal() {
        #[cfg(unix)]
        {
            return read_line_no_echo_unix().map(into_secret);
        }
    }

    read_line_plain().map(into_secret)
}

fn into_secret(line: String) -> SecretString {
    SecretString::new(line.into_boxed_str())
}

fn read_line_plain() -> Result<String, PromptError> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(trim_line_endings(&line))
}

#[cfg(unix)]
fn read_line_no_echo_unix() -> Result<String, PromptError> {
    use std::mem::MaybeUninit;
    use std::os::unix::io::AsRawFd;

    let stdin = io::stdin();
    let fd = stdin.as_raw_fd();

    unsafe {
        let mut original = MaybeUninit::<libc::termios>::uninit();
        if libc::tcgetattr(fd, original.as_mut_ptr()) != 0 {
            return read_line_plain();
        }
        let original = original.assume_init();

        let mut raw = original;
        raw.c_lflag &= !libc::ECHO;
        if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) != 0 {
            return read_line_plain();
        }

        let result = read_line_plain();
        libc::tcsetattr(fd, libc::TCSAFLUSH, &original);
        eprintln!();
        result
    }
}

fn trim_line_endings(line: &str) -> String {
    line.trim_end_matches(['\r', '\n']).to_string()
}
