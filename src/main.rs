use anyhow::Result;

fn main() -> Result<()> {
    songfess::cli::run()
}
