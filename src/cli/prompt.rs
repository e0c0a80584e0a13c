use crate::session::{Challenge, VerificationCodeProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks the operator for verification codes on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinCodeProvider;

#[async_trait]
impl VerificationCodeProvider for StdinCodeProvider {
    async fn request_code(&self, challenge: &Challenge) -> Result<String> {
        let prompt = match challenge {
            Challenge::Checkpoint { username } => {
                format!("Security code sent for {username}: ")
            }
            Challenge::TwoFactor { username } => format!("Two-factor code for {username}: "),
        };

        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        let code = line.trim().to_string();
        if code.is_empty() {
            return Err(Error::internal("no verification code entered"));
        }
        Ok(code)
    }
}
