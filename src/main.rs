fn main() {
    use kube_graph::cli::parse;
    let cli = parse();
    let code = kube_graph::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
