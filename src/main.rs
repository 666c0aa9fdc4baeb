use bundlesync::app;

fn main() {
    std::process::exit(app::startup::startup());
}
