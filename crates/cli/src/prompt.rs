use std::{
    cell::RefCell,
    io::{self, BufRead, StdinLock, Write},
};

use core_lib::{CodeProvider, TokenError, UserAgent};

/// Opens the consent page in the default browser.
pub struct BrowserUserAgent;

impl UserAgent for BrowserUserAgent {
    fn launch(&self, url: &str) -> Result<(), TokenError> {
        eprintln!("Opening browser for authorization...\n{url}\n");
        eprintln!("After approval, copy the 'code=' value from the URL and paste it here.");
        open::that(url).map_err(|e| TokenError::UserAgent(e.to_string()))
    }
}

/// Reads the authorization code from a line of input after printing a prompt.
pub struct PromptCodeProvider<R> {
    prompt: String,
    input: RefCell<R>,
}

impl PromptCodeProvider<StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new("PASTE_AUTH_CODE_HERE: ", io::stdin().lock())
    }
}

impl<R: BufRead> PromptCodeProvider<R> {
    pub fn new(prompt: impl Into<String>, input: R) -> Self {
        Self {
            prompt: prompt.into(),
            input: RefCell::new(input),
        }
    }
}

impl<R: BufRead> CodeProvider for PromptCodeProvider<R> {
    fn authorization_code(&self) -> Result<String, TokenError> {
        eprint!("{}", self.prompt);
        io::stderr()
            .flush()
            .map_err(|e| TokenError::CodeInput(e.to_string()))?;

        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|e| TokenError::CodeInput(e.to_string()))?;
        if read == 0 {
            return Err(TokenError::CodeInput(
                "input closed before a code was entered".to_string(),
            ));
        }

        Ok(line.trim().to_string())
    }
}
