//! Warden permissions middleware — Demo CLI
//!
//! Drives the middleware directly (no transport) through three scenarios:
//!
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- grant-handshake
//!   cargo run -p demo -- caveat-filter
//!   cargo run -p demo -- user-rejection

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use warden_contracts::{
    caveat::{Caveat, FILTER_RESPONSE},
    error::WardenResult,
    request::{OriginMetadata, PermissionDescriptor, PermissionRequest, RequestedPermissions},
    rpc::{RpcError, RpcRequest, RpcResponse},
};
use warden_core::{ApprovalHandler, ControllerConfig, PermissionsController, RestrictedMethod};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Warden — capability-based permissions middleware demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Warden permissions middleware demo",
    long_about = "Runs Warden demo scenarios showing the permission-request handshake,\n\
                  caveat-constrained restricted calls, and user rejection.\n\n\
                  Scenarios:\n\
                  1. Grant Handshake — requestPermissions, approval, authorized call\n\
                  2. Caveat Filter   — a filterResponse caveat trims the result\n\
                  3. User Rejection  — an empty approval refuses the grant"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: the permission-request handshake and an authorized call.
    GrantHandshake,
    /// Scenario 2: a filterResponse caveat constrains what the caller sees.
    CaveatFilter,
    /// Scenario 3: the user declines and the request errors out.
    UserRejection,
}

// ── Approval handlers ─────────────────────────────────────────────────────────

/// Approves everything the request asks for, as a cooperative user would.
struct ApproveAll;

#[async_trait]
impl ApprovalHandler for ApproveAll {
    async fn request_approval(
        &self,
        request: &PermissionRequest,
    ) -> Result<RequestedPermissions, RpcError> {
        println!(
            "  [user] approving {:?} for '{}'",
            request.permissions.keys().collect::<Vec<_>>(),
            request.origin
        );
        Ok(request.permissions.clone())
    }
}

/// Declines everything: resolves with an empty approval.
struct DeclineAll;

#[async_trait]
impl ApprovalHandler for DeclineAll {
    async fn request_approval(
        &self,
        request: &PermissionRequest,
    ) -> Result<RequestedPermissions, RpcError> {
        println!("  [user] declining the request from '{}'", request.origin);
        Ok(RequestedPermissions::new())
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn restricted_methods() -> BTreeMap<String, RestrictedMethod> {
    let mut table = BTreeMap::new();
    table.insert(
        "readContacts".to_string(),
        RestrictedMethod::new(
            "Read the address book",
            Arc::new(|_req, res| {
                res.result = Some(json!(["alice", "bob", "carol"]));
                Ok(())
            }),
        ),
    );
    table.insert(
        "readAccounts".to_string(),
        RestrictedMethod::new(
            "List account addresses",
            Arc::new(|_req, res| {
                res.result = Some(json!(["0xA", "0xB", "0xC"]));
                Ok(())
            }),
        ),
    );
    table
}

fn controller(approval: Arc<dyn ApprovalHandler>) -> WardenResult<Arc<PermissionsController>> {
    let controller = PermissionsController::new(ControllerConfig {
        safe_methods: vec!["ping".to_string()],
        restricted_methods: restricted_methods(),
        method_prefix: "wallet_".to_string(),
        request_user_approval: Some(approval),
        ..ControllerConfig::default()
    })?;
    Ok(Arc::new(controller))
}

fn show(label: &str, res: &RpcResponse) {
    match (&res.result, &res.error) {
        (Some(result), _) => println!("  {label} → result {result}"),
        (_, Some(error)) => println!("  {label} → error {} ({})", error.code, error.message),
        _ => println!("  {label} → passed through"),
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

async fn grant_handshake() -> WardenResult<()> {
    println!("\n=== Scenario 1: Grant Handshake ===");
    let controller = controller(Arc::new(ApproveAll))?;
    let middleware = controller.for_origin(OriginMetadata::new("https://site.one"));

    // Unauthorized first: the capability does not exist yet.
    let call = RpcRequest::new("readContacts", vec![]);
    let mut res = RpcResponse::default();
    middleware.handle(&call, &mut res).await;
    show("readContacts (before grant)", &res);

    // The handshake: request, approve, grant.
    let request = RpcRequest::new(
        "wallet_requestPermissions",
        vec![json!({ "readContacts": {} })],
    );
    let mut res = RpcResponse::default();
    middleware.handle(&request, &mut res).await;
    show("wallet_requestPermissions", &res);

    // Authorized now.
    let mut res = RpcResponse::default();
    middleware.handle(&call, &mut res).await;
    show("readContacts (after grant)", &res);

    Ok(())
}

async fn caveat_filter() -> WardenResult<()> {
    println!("\n=== Scenario 2: Caveat Filter ===");
    let controller = controller(Arc::new(ApproveAll))?;

    // Host-side grant with a response filter: only two accounts are visible.
    let permissions: RequestedPermissions = [(
        "readAccounts".to_string(),
        PermissionDescriptor {
            caveats: Some(vec![Caveat::new(FILTER_RESPONSE, json!(["0xA", "0xB"]))]),
        },
    )]
    .into_iter()
    .collect();
    controller.add_permissions_for("https://site.one", &permissions)?;

    let middleware = controller.for_origin(OriginMetadata::new("https://site.one"));
    let call = RpcRequest::new("readAccounts", vec![]);
    let mut res = RpcResponse::default();
    middleware.handle(&call, &mut res).await;
    show("readAccounts (method returns 3, caveat keeps 2)", &res);

    Ok(())
}

async fn user_rejection() -> WardenResult<()> {
    println!("\n=== Scenario 3: User Rejection ===");
    let controller = controller(Arc::new(DeclineAll))?;
    let middleware = controller.for_origin(OriginMetadata::new("https://site.two"));

    let request = RpcRequest::new(
        "wallet_requestPermissions",
        vec![json!({ "readContacts": {} })],
    );
    let mut res = RpcResponse::default();
    middleware.handle(&request, &mut res).await;
    show("wallet_requestPermissions", &res);

    println!(
        "  pending queue afterwards: {} entries",
        controller.get_permissions_requests()?.len()
    );

    Ok(())
}

async fn run_all() -> WardenResult<()> {
    grant_handshake().await?;
    caveat_filter().await?;
    user_rejection().await?;
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Structured logging; set RUST_LOG=debug for the middleware's own trace.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::GrantHandshake => grant_handshake().await,
        Command::CaveatFilter => caveat_filter().await,
        Command::UserRejection => user_rejection().await,
    };

    match result {
        Ok(()) => {
            println!("\nAll selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}
