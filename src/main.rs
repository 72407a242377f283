fn main() {
    use querysync::cli::parse;
    let cli = parse();
    querysync::utils::logging::init(cli.verbose);
    let code = querysync::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
