fn main() {
    std::process::exit(redo::run::run());
}
