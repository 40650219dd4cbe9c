use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::errors::TicketFlowError;
use crate::models::ticket::{RawTicket, TicketResponse};
use crate::pipeline::window::{FetchWindow, MAX_PAGES};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FULL_SELECT: &str = "id,type,origin,status,urgency,originEmailAccount,\
serviceFirstLevelId,serviceFull,createdBy,owner,ownerTeam,createdDate,\
lastUpdate,cc,clients,actions,parentTickets,childrenTickets,statusHistories,\
customFieldValues,assets,chatWaitingTime,resolvedIn,subject";
const FULL_EXPAND: &str = "owner,createdBy,customFieldValues($expand=items)";

/// Field-selection/expansion directive for a fetch. Determines whether
/// normalization sees the full ticket shape or the narrow actions-only
/// shape; the two must never be merged without a join on ticket id.
#[derive(Debug, Clone)]
pub struct TicketQuery {
    select: &'static str,
    expand: &'static str,
    extra_filter: Option<String>,
}

impl TicketQuery {
    pub fn full(team_exclusion: Option<&str>) -> Self {
        Self {
            select: FULL_SELECT,
            expand: FULL_EXPAND,
            extra_filter: team_exclusion.map(|team| format!("ownerTeam ne '{}'", team)),
        }
    }

    pub fn actions_only() -> Self {
        Self {
            select: "id,actions",
            expand: "actions",
            extra_filter: None,
        }
    }

    fn filter_for(&self, window: &FetchWindow) -> String {
        let mut filter = format!(
            "createdDate ge {} and createdDate le {}",
            window.start, window.end
        );
        if let Some(extra) = &self.extra_filter {
            filter.push_str(" and ");
            filter.push_str(extra);
        }
        filter
    }
}

pub struct TicketClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TicketClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// One GET covering the whole window.
    pub async fn fetch_window(
        &self,
        window: &FetchWindow,
        query: &TicketQuery,
    ) -> Result<Vec<RawTicket>> {
        let url = format!("{}/tickets", self.base_url);
        let filter = query.filter_for(window);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("token", self.token.as_str()),
                ("$select", query.select),
                ("$expand", query.expand),
                ("$filter", filter.as_str()),
            ])
            .send()
            .await
            .context("Failed to send ticket query")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ticket API error ({}): {}", status, text);
        }

        let tickets = response
            .json::<TicketResponse>()
            .await
            .context("Failed to parse ticket response")?;

        Ok(tickets.into_tickets())
    }

    /// Offset pagination over one window: requests `$top`-sized pages
    /// until a short or empty page. Bounded by MAX_PAGES in case the
    /// server keeps misreporting full pages.
    ///
    /// A page that fails mid-sweep stops pagination but keeps everything
    /// fetched before it; the failure travels back as a warning.
    pub async fn fetch_paged(
        &self,
        window: &FetchWindow,
        query: &TicketQuery,
        page_size: usize,
    ) -> Result<PagedFetch> {
        self.fetch_paged_bounded(window, query, page_size, MAX_PAGES)
            .await
    }

    async fn fetch_paged_bounded(
        &self,
        window: &FetchWindow,
        query: &TicketQuery,
        page_size: usize,
        max_pages: usize,
    ) -> Result<PagedFetch> {
        let url = format!("{}/tickets", self.base_url);
        let filter = query.filter_for(window);
        let top = page_size.to_string();

        let mut all = Vec::new();
        for page in 0..max_pages {
            let skip = (page * page_size).to_string();

            let send_result = self
                .client
                .get(&url)
                .query(&[
                    ("token", self.token.as_str()),
                    ("$select", query.select),
                    ("$expand", query.expand),
                    ("$filter", filter.as_str()),
                    ("$top", top.as_str()),
                    ("$skip", skip.as_str()),
                ])
                .send()
                .await;

            let response = match send_result {
                Ok(response) => response,
                Err(err) => {
                    return Ok(PagedFetch {
                        tickets: all,
                        warning: Some(format!("page {} failed: {}", page + 1, err)),
                    });
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Ok(PagedFetch {
                    tickets: all,
                    warning: Some(format!(
                        "page {} failed: Ticket API error ({}): {}",
                        page + 1,
                        status,
                        text
                    )),
                });
            }

            let tickets = response
                .json::<TicketResponse>()
                .await
                .context("Failed to parse ticket response")?
                .into_tickets();

            let short_page = tickets.len() < page_size;
            all.extend(tickets);
            if short_page {
                return Ok(PagedFetch {
                    tickets: all,
                    warning: None,
                });
            }
        }

        anyhow::bail!("{}", TicketFlowError::PaginationOverflow(max_pages))
    }
}

/// Outcome of an offset-paginated sweep: the tickets collected before the
/// sweep finished or broke off, plus the page failure if there was one.
#[derive(Debug)]
pub struct PagedFetch {
    pub tickets: Vec<RawTicket>,
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn april_first() -> FetchWindow {
        FetchWindow {
            start: "2025-04-01T00:00:00.000Z".to_string(),
            end: "2025-04-01T23:59:59.999Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_window_accepts_bare_array() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tickets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let tickets = client
            .fetch_window(&april_first(), &TicketQuery::full(None))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_window_accepts_wrapped_value_array() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": [{"id": 3}]}"#)
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let tickets = client
            .fetch_window(&april_first(), &TicketQuery::full(None))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0]["id"], 3);
    }

    #[tokio::test]
    async fn test_fetch_window_surfaces_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let result = client
            .fetch_window(&april_first(), &TicketQuery::full(None))
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("500"), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_filter_includes_window_and_team_exclusion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tickets")
            .match_query(Matcher::AllOf(vec![
                // Tolerate whichever space encoding the client picked
                Matcher::Regex("createdDate( |\\+|%20)ge( |\\+|%20)2025-04-01".to_string()),
                Matcher::Regex("ownerTeam".to_string()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let tickets = client
            .fetch_window(&april_first(), &TicketQuery::full(Some("Agente - CRC")))
            .await
            .unwrap();

        assert!(tickets.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_paged_stops_on_short_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=0(&|$)".to_string()))
            .with_status(200)
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=2(&|$)".to_string()))
            .with_status(200)
            .with_body(r#"[{"id": 3}]"#)
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let fetch = client
            .fetch_paged(&april_first(), &TicketQuery::actions_only(), 2)
            .await
            .unwrap();

        assert_eq!(fetch.tickets.len(), 3);
        assert_eq!(fetch.tickets[2]["id"], 3);
        assert!(fetch.warning.is_none());
    }

    #[tokio::test]
    async fn test_fetch_paged_stops_on_empty_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=0(&|$)".to_string()))
            .with_status(200)
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=2(&|$)".to_string()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let fetch = client
            .fetch_paged(&april_first(), &TicketQuery::actions_only(), 2)
            .await
            .unwrap();

        assert_eq!(fetch.tickets.len(), 2);
        assert!(fetch.warning.is_none());
    }

    #[tokio::test]
    async fn test_fetch_paged_keeps_earlier_pages_when_one_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=0(&|$)".to_string()))
            .with_status(200)
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Regex("skip=2(&|$)".to_string()))
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let fetch = client
            .fetch_paged(&april_first(), &TicketQuery::actions_only(), 2)
            .await
            .unwrap();

        assert_eq!(fetch.tickets.len(), 2);
        assert_eq!(fetch.tickets[1]["id"], 2);
        let warning = fetch.warning.unwrap();
        assert!(warning.contains("502"), "unexpected warning: {}", warning);
    }

    #[tokio::test]
    async fn test_fetch_paged_errors_when_server_never_reports_a_short_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .expect(3)
            .create_async()
            .await;

        let client = TicketClient::new(server.url(), "tok".to_string()).unwrap();
        let result = client
            .fetch_paged_bounded(&april_first(), &TicketQuery::actions_only(), 2, 3)
            .await;

        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("Pagination did not terminate"),
            "unexpected error: {}",
            err
        );
    }
}
