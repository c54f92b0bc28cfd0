use std::sync::Arc;

use tracing::{info, warn};

use warden_core::{BugFinding, PrLocator, Result, TicketRecord, WardenError};
use warden_flow::{Flow, FlowBuilder, Target};
use warden_jira::{extract_ticket_key, issue_for_finding, IssueTracker};

use crate::Connector;

/// State for the ticket stage.
pub struct TicketState {
    /// The pull request the findings came from.
    pub locator: PrLocator,
    /// Findings to file tickets for.
    pub findings: Vec<BugFinding>,
    /// Tickets successfully filed, set by CREATE_TICKETS.
    pub tickets: Vec<TicketRecord>,
    /// Creations attempted, including failed ones.
    pub attempted: usize,
    session: Option<Arc<dyn IssueTracker>>,
}

impl TicketState {
    /// Fresh state for one ticket run.
    pub fn new(locator: PrLocator, findings: Vec<BugFinding>) -> Self {
        Self {
            locator,
            findings,
            tickets: Vec::new(),
            attempted: 0,
            session: None,
        }
    }
}

/// What the ticket stage hands back to the orchestrator.
#[derive(Debug)]
pub struct TicketOutput {
    /// Tickets successfully filed.
    pub tickets: Vec<TicketRecord>,
    /// Creations attempted, including failed ones.
    pub attempted: usize,
}

/// Router after CONNECT: file tickets only when a tracker session exists and
/// there is at least one finding.
pub fn should_create_tickets(state: &TicketState) -> &'static str {
    if state.session.is_none() || state.findings.is_empty() {
        "skip"
    } else {
        "create"
    }
}

/// Build the ticket flow: INIT, CONNECT, then a branch to CREATE_TICKETS or
/// straight to the end.
///
/// A tracker that cannot be reached is not a fault here: CONNECT logs the
/// failure, leaves the session unset, and the router skips creation. Within
/// CREATE_TICKETS each finding is attempted independently; a failed creation
/// or an unreadable response drops that one ticket and the loop moves on.
pub fn build_tickets_flow(
    connect: Connector<Arc<dyn IssueTracker>>,
    issue_type: String,
) -> Result<Flow<TicketState>> {
    FlowBuilder::new("tickets")
        .node("INIT", |mut state: TicketState| async move {
            state.tickets.clear();
            state.attempted = 0;
            state.session = None;
            Ok(state)
        })
        .node("CONNECT", {
            let connect = connect.clone();
            move |mut state: TicketState| {
                let connect = connect.clone();
                async move {
                    match connect() {
                        Ok(session) => state.session = Some(session),
                        Err(e) => {
                            warn!(error = %e, "issue tracker unavailable, tickets will be skipped")
                        }
                    }
                    Ok(state)
                }
            }
        })
        .node("CREATE_TICKETS", {
            let issue_type = issue_type.clone();
            move |mut state: TicketState| {
                let issue_type = issue_type.clone();
                async move {
                    let Some(session) = state.session.clone() else {
                        return Err(WardenError::Assembly(
                            "ticket creation reached without a tracker session".into(),
                        ));
                    };
                    for finding in &state.findings {
                        state.attempted += 1;
                        let issue = issue_for_finding(finding, &state.locator, &issue_type);
                        let response = match session.create_issue(&issue).await {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, location = %finding.location, "ticket creation failed");
                                continue;
                            }
                        };
                        let Some(key) = extract_ticket_key(&response) else {
                            warn!(location = %finding.location, "no issue key in tracker response");
                            continue;
                        };
                        let url = session.browse_url(&key);
                        info!(key = %key, severity = %finding.severity, "ticket filed");
                        state.tickets.push(TicketRecord {
                            key,
                            url,
                            severity: finding.severity,
                            kind: finding.kind.clone(),
                        });
                    }
                    Ok(state)
                }
            }
        })
        .entry("INIT")
        .edge("INIT", "CONNECT")
        .branch(
            "CONNECT",
            should_create_tickets,
            [
                ("skip", Target::End),
                ("create", Target::Node("CREATE_TICKETS")),
            ],
        )
        .edge("CREATE_TICKETS", Target::End)
        .build()
}

/// Run the ticket flow for the given findings.
pub async fn run_tickets(
    flow: &Flow<TicketState>,
    locator: PrLocator,
    findings: Vec<BugFinding>,
) -> Result<TicketOutput> {
    let state = flow.run(TicketState::new(locator, findings)).await?;
    Ok(TicketOutput {
        tickets: state.tickets,
        attempted: state.attempted,
    })
}
