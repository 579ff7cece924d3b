fn main() {
    std::process::exit(dashctl_lib::run());
}
