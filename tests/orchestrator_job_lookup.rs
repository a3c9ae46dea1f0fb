//! Job-lookup scenarios for the bracket and TTL orchestrators
//! (`spec.md` §4.4, §4.5, §8) that don't require reaching the exchange:
//! status/cancel calls against an unknown job id must fail with
//! `not_found` rather than panicking, and a fresh orchestrator starts
//! with no jobs registered.

use binance_futures_agent_tools::error::ErrorKind;
use binance_futures_agent_tools::orchestrator::bracket::BracketOrchestrator;
use binance_futures_agent_tools::orchestrator::ttl::TtlOrchestrator;

#[test]
fn bracket_status_on_unknown_job_is_not_found() {
    let orchestrator = BracketOrchestrator::new();
    let response = orchestrator.get_job_status("bracket_deadbeef");

    assert!(!response.success);
    assert_eq!(response.error.unwrap().kind, ErrorKind::NotFound);
}

#[test]
fn ttl_status_on_unknown_job_is_not_found() {
    let orchestrator = TtlOrchestrator::new();
    let response = orchestrator.get_job_status("ttl_deadbeef");

    assert!(!response.success);
    assert_eq!(response.error.unwrap().kind, ErrorKind::NotFound);
}

#[test]
fn ttl_cancel_on_unknown_job_is_not_found() {
    let orchestrator = TtlOrchestrator::new();
    let response = orchestrator.cancel_ttl_job("ttl_deadbeef");

    assert!(!response.success);
    assert_eq!(response.error.unwrap().kind, ErrorKind::NotFound);
}

#[test]
fn fresh_orchestrators_have_no_jobs() {
    let bracket = BracketOrchestrator::new();
    let ttl = TtlOrchestrator::new();

    assert!(bracket.get_job("bracket_anything").is_none());
    assert!(ttl.get_job("ttl_anything").is_none());
}
