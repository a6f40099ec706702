use anyhow::Context;

fn main() -> anyhow::Result<()> {
    snapsight::run().context("snapsight exited with an error")
}
