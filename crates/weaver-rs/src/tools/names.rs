//! Tool name constants for Junior's catalog.

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_DIRECTORY: &str = "list_directory";
pub const EXECUTE_COMMAND: &str = "execute_command";
pub const SEARCH_FILES: &str = "search_files";
pub const CONTEXT_WRITE: &str = "context_write";
pub const CONTEXT_READ: &str = "context_read";

/// Every tool in the catalog, sorted by name.
pub const ALL: &[&str] = &[
    CONTEXT_READ,
    CONTEXT_WRITE,
    EXECUTE_COMMAND,
    LIST_DIRECTORY,
    READ_FILE,
    SEARCH_FILES,
    WRITE_FILE,
];
