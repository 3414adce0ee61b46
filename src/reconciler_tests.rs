// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::model::RecordSet;

struct FakeSource {
    zones: HashMap<String, Zone>,
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn list_owned_zones(&self, _nameserver_id: u64) -> Result<Vec<crate::source::ZoneSummary>, EngineError> {
        Ok(self
            .zones
            .keys()
            .map(|name| crate::source::ZoneSummary { name: name.clone() })
            .collect())
    }

    async fn get_zone_records(&self, zone_name: &str) -> Result<Option<Zone>, EngineError> {
        Ok(self.zones.get(zone_name).cloned())
    }

    async fn get_nameserver_fqdn(&self, _nameserver_id: u64) -> Result<Option<String>, EngineError> {
        Ok(Some("ns1.example.com.".to_string()))
    }
}

#[derive(Default)]
struct FakeReplica {
    zones: Mutex<HashMap<String, Zone>>,
    create_calls: Mutex<u32>,
    patch_calls: Mutex<u32>,
    delete_calls: Mutex<u32>,
}

#[async_trait]
impl ReplicaClient for FakeReplica {
    async fn get_zone(&self, name: &str) -> Result<Option<Zone>, EngineError> {
        Ok(self.zones.lock().unwrap().get(name).cloned())
    }

    async fn list_zones(&self) -> Result<Vec<crate::replica::ReplicaZoneSummary>, EngineError> {
        Ok(self
            .zones
            .lock()
            .unwrap()
            .values()
            .map(|z| crate::replica::ReplicaZoneSummary {
                name: z.name.clone(),
                nameservers: z.nameservers.clone(),
            })
            .collect())
    }

    async fn create_zone(&self, zone: &Zone) -> Result<(), EngineError> {
        *self.create_calls.lock().unwrap() += 1;
        self.zones.lock().unwrap().insert(zone.name.clone(), zone.clone());
        Ok(())
    }

    async fn patch_zone(&self, name: &str, changes: &[crate::diff::RrsetChange]) -> Result<(), EngineError> {
        *self.patch_calls.lock().unwrap() += 1;
        let mut zones = self.zones.lock().unwrap();
        let zone = zones.get_mut(name).expect("patch on known zone");
        for change in changes {
            match change {
                crate::diff::RrsetChange::Replace(rrset) => {
                    zone.rrsets.retain(|r| r.key() != rrset.key());
                    zone.rrsets.push(rrset.clone());
                }
                crate::diff::RrsetChange::Delete { name, rr_type } => {
                    zone.rrsets.retain(|r| &r.name != name || &r.rr_type != rr_type);
                }
            }
        }
        Ok(())
    }

    async fn delete_zone(&self, name: &str) -> Result<(), EngineError> {
        *self.delete_calls.lock().unwrap() += 1;
        self.zones.lock().unwrap().remove(name);
        Ok(())
    }
}

fn managed_types() -> std::collections::HashSet<String> {
    ["A", "AAAA", "CNAME"].iter().map(|s| (*s).to_string()).collect()
}

fn a_rrset(name: &str, ip: &str) -> RecordSet {
    RecordSet {
        name: name.to_string(),
        rr_type: "A".to_string(),
        ttl: 300,
        records: vec![crate::model::Record { content: ip.to_string(), disabled: false }],
        comments: vec![],
    }
}

fn zone(name: &str, nameservers: Vec<&str>, rrsets: Vec<RecordSet>) -> Zone {
    Zone {
        name: name.to_string(),
        kind: ZoneKind::Native,
        nameservers: nameservers.into_iter().map(str::to_string).collect(),
        soa_edit_api: "DEFAULT".to_string(),
        rrsets,
    }
}

#[tokio::test]
async fn creates_zone_missing_on_replica() {
    let source = FakeSource {
        zones: HashMap::from([(
            "example.com".to_string(),
            zone("example.com.", vec!["ns1.example.com."], vec![a_rrset("www.example.com.", "10.0.0.1")]),
        )]),
    };
    let replica = FakeReplica::default();
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Created);
}

#[tokio::test]
async fn reports_unchanged_when_converged() {
    let rrset = a_rrset("www.example.com.", "10.0.0.1");
    let source = FakeSource {
        zones: HashMap::from([("example.com".to_string(), zone("example.com.", vec!["ns1.example.com."], vec![rrset.clone()]))]),
    };
    let replica = FakeReplica::default();
    replica.zones.lock().unwrap().insert(
        "example.com.".to_string(),
        zone("example.com.", vec!["ns1.example.com."], vec![rrset]),
    );
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn patches_zone_when_drifted() {
    let source = FakeSource {
        zones: HashMap::from([(
            "example.com".to_string(),
            zone("example.com.", vec!["ns1.example.com."], vec![a_rrset("www.example.com.", "10.0.0.2")]),
        )]),
    };
    let replica = FakeReplica::default();
    replica.zones.lock().unwrap().insert(
        "example.com.".to_string(),
        zone("example.com.", vec!["ns1.example.com."], vec![a_rrset("www.example.com.", "10.0.0.1")]),
    );
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Updated);
}

#[tokio::test]
async fn deletes_owned_zone_removed_from_source() {
    let source = FakeSource { zones: HashMap::new() };
    let replica = FakeReplica::default();
    replica
        .zones
        .lock()
        .unwrap()
        .insert("gone.example.com.".to_string(), zone("gone.example.com.", vec!["ns1.example.com."], vec![]));
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("gone.example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Deleted);
}

#[tokio::test]
async fn leaves_unowned_zone_alone_when_absent_from_source() {
    let source = FakeSource { zones: HashMap::new() };
    let replica = FakeReplica::default();
    replica.zones.lock().unwrap().insert(
        "other.example.com.".to_string(),
        zone("other.example.com.", vec!["ns-someone-else.example.com."], vec![]),
    );
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("other.example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn skips_when_neither_side_has_the_zone() {
    let source = FakeSource { zones: HashMap::new() };
    let replica = FakeReplica::default();
    let reconciler = ZoneReconciler::new(Arc::new(source), Arc::new(replica), "ns1.example.com.".into(), managed_types());

    let outcome = reconciler.reconcile("nowhere.example.com").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
}
