use colored::*;
use std::fmt;

#[derive(Debug)]
pub enum TicketFlowError {
    // Configuration errors - fatal, reported before any network call
    ConfigNotFound,
    ConfigInvalid(String),
    InvalidDateRange(String),

    // Ticket API errors
    ApiAuthFailed(u16),
    ApiError(u16, String),
    PaginationOverflow(usize),

    // Network errors
    NetworkError(String),

    // Export sink errors - the in-memory table stays usable
    SinkFailed(String),

    // Generic error
    Other(String),
}

impl fmt::Display for TicketFlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Configuration errors
            TicketFlowError::ConfigNotFound => {
                write!(f, "{}\n", "Configuration not found".red().bold())?;
                write!(f, "   {}\n\n", "Run 'ticketflow init' to set up your configuration".dimmed())?;
                write!(f, "   {}", "ticketflow init".green())
            }
            TicketFlowError::ConfigInvalid(msg) => {
                write!(f, "{}\n", "Invalid configuration".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your config file: ~/.ticketflow/config.toml\n")?;
                write!(f, "   2. Or reinitialize: {}", "ticketflow init".green())
            }
            TicketFlowError::InvalidDateRange(msg) => {
                write!(f, "{}\n", "Invalid date range".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Dates must be in YYYY-MM-DD format\n")?;
                write!(f, "   2. The start date must not be after the end date")
            }

            // Ticket API errors
            TicketFlowError::ApiAuthFailed(status) => {
                write!(f, "{}\n", format!("Ticket API authentication failed ({})", status).red().bold())?;
                write!(f, "   {}\n\n", "Your access token may have expired or is invalid".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Generate a new token in the ticket system's admin panel\n")?;
                write!(f, "   2. Update config: {}\n", "ticketflow config set api.token <new-token>".green())?;
                write!(f, "   3. Or export it: {}", "TICKETFLOW_TOKEN=<new-token>".green())
            }
            TicketFlowError::ApiError(status, msg) => {
                write!(f, "{}\n", format!("Ticket API error ({})", status).red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   Try again or check your network connection")
            }
            TicketFlowError::PaginationOverflow(pages) => {
                write!(f, "{}\n", format!("Pagination did not terminate after {} pages", pages).red().bold())?;
                write!(f, "   {}\n\n", "The server keeps reporting full pages".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Narrow the date range\n")?;
                write!(f, "   2. Or increase page_size in ~/.ticketflow/config.toml")
            }

            // Network errors
            TicketFlowError::NetworkError(msg) => {
                write!(f, "{}\n", "Network error".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your internet connection\n")?;
                write!(f, "   2. Verify you can reach the ticket API endpoint\n")?;
                write!(f, "   3. Try again in a moment")
            }

            // Sink errors
            TicketFlowError::SinkFailed(msg) => {
                write!(f, "{}\n", "Export sink failed".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   The extracted table was still written locally\n")?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check the destination is writable\n")?;
                write!(f, "   2. Update it: {}", "ticketflow config set export.destination <path>".green())
            }

            // Generic
            TicketFlowError::Other(msg) => {
                write!(f, "{}\n", "Error".red().bold())?;
                write!(f, "   {}", msg.dimmed())
            }
        }
    }
}

impl std::error::Error for TicketFlowError {}

// Conversion from anyhow::Error
impl From<anyhow::Error> for TicketFlowError {
    fn from(err: anyhow::Error) -> Self {
        TicketFlowError::Other(err.to_string())
    }
}

// Helper to convert common error types
impl From<std::io::Error> for TicketFlowError {
    fn from(err: std::io::Error) -> Self {
        TicketFlowError::Other(err.to_string())
    }
}

impl From<reqwest::Error> for TicketFlowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            TicketFlowError::NetworkError(err.to_string())
        } else if let Some(status) = err.status() {
            if status == 401 || status == 403 {
                TicketFlowError::ApiAuthFailed(status.as_u16())
            } else {
                TicketFlowError::ApiError(status.as_u16(), err.to_string())
            }
        } else {
            TicketFlowError::Other(err.to_string())
        }
    }
}
