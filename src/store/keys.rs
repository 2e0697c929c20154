//! Key namespace builders for the Incident Store (spec §4.1).
//!
//! By convention writes are partitioned by key-prefix to the owning agent
//! (spec §5): only the correlator writes `ec:*`, only the provisioner and
//! restoration monitor write `bsid:*`, etc. These helpers keep the prefixes
//! in one place so a typo can't silently split a logical namespace.

/// Key for an incident record: `orchestrator:incident:{id}`.
pub fn incident(incident_id: &str) -> String {
    format!("orchestrator:incident:{incident_id}")
}

/// Key for a dedup hash entry: `ec:dedup:hash:{h}`.
pub fn dedup_hash(hash: &str) -> String {
    format!("ec:dedup:hash:{hash}")
}

/// Key for a link's flap history list: `ec:flap:history:{link}`.
pub fn flap_history(link_id: &str) -> String {
    format!("ec:flap:history:{link_id}")
}

/// Key for a link's flap counter: `ec:flap:count:{link}`.
pub fn flap_count(link_id: &str) -> String {
    format!("ec:flap:count:{link_id}")
}

/// Key for a link's dampen-until timestamp: `ec:flap:dampen:{link}`.
pub fn flap_dampen(link_id: &str) -> String {
    format!("ec:flap:dampen:{link_id}")
}

/// Key for a correlation rule's time-ordered group set:
/// `ec:correlation:{rule}:{group}`.
pub fn correlation_window(rule: &str, group: &str) -> String {
    format!("ec:correlation:{rule}:{group}")
}

/// Key for the next-free MPLS BSID counter at a head-end: `bsid:mpls:{head}`.
pub fn bsid_counter(head_end: &str) -> String {
    format!("bsid:mpls:{head_end}")
}

/// Key for a head-end's released-BSID free-set: `bsid:free:{head}`.
pub fn bsid_free(head_end: &str) -> String {
    format!("bsid:free:{head_end}")
}

/// Key for the next SRv6 locator counter at a head-end: `bsid:srv6:{head}`.
pub fn bsid_srv6_counter(head_end: &str) -> String {
    format!("bsid:srv6:{head_end}")
}

/// Key for a hold-timer record: `timer:{incident_id}`.
pub fn hold_timer(incident_id: &str) -> String {
    format!("timer:{incident_id}")
}

/// Key for an in-flight BSID assignment, kept until a tunnel create
/// verifies, so a retried `provision_tunnel` call reuses it instead of
/// minting a second binding-SID: `bsid:assignment:{incident_id}`.
pub fn bsid_assignment(incident_id: &str) -> String {
    format!("bsid:assignment:{incident_id}")
}

/// Key for the set of all active restoration timers: `restoration:timers`.
pub const RESTORATION_TIMERS: &str = "restoration:timers";

/// Key for a tunnel record: `tunnel:{id}`.
pub fn tunnel(tunnel_id: &str) -> String {
    format!("tunnel:{tunnel_id}")
}

/// Key for an incident's append-only audit trail: `audit:{incident_id}`.
pub fn audit_log(incident_id: &str) -> String {
    format!("audit:{incident_id}")
}

/// Prefixes considered authoritative: failures here must propagate, never
/// fall back to an in-process cache (spec §4.1, §7 "Store unavailable").
pub const AUTHORITATIVE_PREFIXES: &[&str] = &["orchestrator:incident:", "tunnel:"];

/// Whether `key` belongs to an authoritative namespace.
pub fn is_authoritative(key: &str) -> bool {
    AUTHORITATIVE_PREFIXES.iter().any(|p| key.starts_with(p))
}
