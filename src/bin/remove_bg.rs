//! Background removal CLI binary

use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    ExitCode::from(remove_bg::cli::main().await)
}
