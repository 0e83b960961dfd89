use anyhow::Context as _;

/// Loads `.env` from the working directory or its parents, if there is one.
/// Variables already set in the process environment win.
pub fn load_dotenvy_vars_if_present() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("couldn't load .env file"),
    }
}
