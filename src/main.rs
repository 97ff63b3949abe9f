use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    runlift::cli::main().await
}
