use anyhow::Result;

fn main() -> Result<()> {
    lifetrace::cli::run()
}
