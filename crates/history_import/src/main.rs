use history_import_lib::{cli::parse_args, commands::run_import};

#[tokio::main]
async fn main() {
    let args = parse_args();
    let exit_code = run_import(args).await;
    std::process::exit(exit_code);
}
