//! The `utils` module holds the pieces shared by every layer of `pollpack`:
//! the crate-wide error type and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        logging::init("info");
        logging::init("DEBUG");
        logging::init("not-a-level");
    }
}
