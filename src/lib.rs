pub mod codegen;
pub mod number;
pub mod presets;
pub mod registers;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("number configuration is invalid")]
    Config(#[source] number::Error),
    #[error("could not generate code for the numbers")]
    Codegen(#[source] codegen::Error),
}

/// Validate a YAML list of number entries and produce the statements that construct them.
///
/// Nothing is generated unless every entry is valid.
pub fn to_code(yaml: &str) -> Result<String, Error> {
    let entries = number::parse_entries(yaml).map_err(Error::Config)?;
    let specs = number::validate_entries(&entries).map_err(Error::Config)?;
    tracing::debug!(count = specs.len(), "validated number entries");
    let statements = codegen::generate(&specs).map_err(Error::Codegen)?;
    Ok(codegen::render(&statements))
}
