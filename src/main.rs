fn main() {
    syspkg::run_cli();
}
