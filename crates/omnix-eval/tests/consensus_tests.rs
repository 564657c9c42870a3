//! Simulated-distribution tests: consensus operators, nodes, clusters,
//! pipelines, cross-chain contracts, and the logs they leave behind.

use omnix_eval::{Evaluator, Value};
use std::collections::BTreeMap;

fn run(source: &str) -> (Value, Evaluator) {
    let mut eval = Evaluator::new();
    let value = eval.eval_source(source).unwrap();
    (value, eval)
}

fn record_of(value: &Value) -> &BTreeMap<String, Value> {
    match value {
        Value::Record(fields) => fields,
        other => panic!("expected record, got {other:?}"),
    }
}

fn sequence_of(value: &Value) -> &[Value] {
    match value {
        Value::Sequence(items) => items,
        other => panic!("expected sequence, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Consensus operators
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_propose_returns_accepted_result_and_logs_once() {
    let (value, eval) = run("let a = 5; a <!> { validators: 3 };");
    match value {
        Value::Consensus(result) => {
            assert_eq!(*result.value, Value::Number(5.0));
            assert!(result.accepted);
        }
        other => panic!("expected consensus result, got {other:?}"),
    }

    assert_eq!(eval.consensus_log().len(), 1);
    let record = &eval.consensus_log()[0];
    assert_eq!(record.operation, "PROPOSE");
    assert_eq!(record.value, serde_json::json!(5));
    assert_eq!(record.options, serde_json::json!({ "validators": 3 }));
    assert!(record.timestamp > 0);

    let consensus_lines: Vec<&String> = eval
        .events()
        .iter()
        .filter(|line| line.starts_with("[Consensus]"))
        .collect();
    assert_eq!(consensus_lines.len(), 1);
    assert!(consensus_lines[0].contains("PROPOSE"));
}

#[test]
fn test_all_four_operations_are_recorded_in_order() {
    let (_, eval) = run("let a = 1; a <!>; a <?>; a <#>; a <@>;");
    let operations: Vec<&str> = eval
        .consensus_log()
        .iter()
        .map(|r| r.operation.as_str())
        .collect();
    assert_eq!(operations, vec!["PROPOSE", "VOTE", "MERGE", "QUERY"]);
}

#[test]
fn test_merge_with_operand_writes_back() {
    let (value, _) = run("let counter = 0; counter <#> counter + 1; return counter;");
    assert_eq!(value, Value::Number(1.0));
}

#[test]
fn test_propose_with_operand_does_not_write_back() {
    let (value, _) = run("let v = 10; v <!> 99; return v;");
    assert_eq!(value, Value::Number(10.0));
}

#[test]
fn test_options_are_recorded_but_never_change_control_flow() {
    // A zero validator count and a zero timeout still succeed.
    let (value, eval) = run("1 <!> { validators: 0, timeout: 0ms };");
    match value {
        Value::Consensus(result) => assert!(result.accepted),
        other => panic!("expected consensus result, got {other:?}"),
    }
    assert_eq!(
        eval.consensus_log()[0].options,
        serde_json::json!({ "timeout": 0, "validators": 0 })
    );
}

#[test]
fn test_consensus_result_truthiness_reads_accepted() {
    let (value, _) = run("let r = 0 <!>; if r { return \"accepted\"; } return \"rejected\";");
    // The proposed value 0 is falsy; the accepted flag is what counts.
    assert_eq!(value, Value::Str("accepted".into()));
}

#[test]
fn test_consensus_result_members() {
    let (value, _) = run("let r = 7 <!>; return r.value + 1;");
    assert_eq!(value, Value::Number(8.0));
    let (accepted, _) = run("let r = 7 <!>; return r.accepted;");
    assert_eq!(accepted, Value::Bool(true));
}

#[test]
fn test_duration_option_is_scaled_in_record() {
    let (_, eval) = run("1 <!> { timeout: 5s };");
    assert_eq!(
        eval.consensus_log()[0].options,
        serde_json::json!({ "timeout": 5000 })
    );
}

#[test]
fn test_consensus_log_is_per_evaluator() {
    let (_, eval_a) = run("1 <!>;");
    let mut eval_b = Evaluator::new();
    eval_b.eval_source("let x = 1; return x;").unwrap();
    assert_eq!(eval_a.consensus_log().len(), 1);
    assert!(eval_b.consensus_log().is_empty());
    assert!(eval_b.events().is_empty());
}

#[test]
fn test_consensus_record_serializes() {
    let (_, eval) = run("2 <!> { validators: 3 };");
    let json = serde_json::to_value(&eval.consensus_log()[0]).unwrap();
    assert_eq!(json["operation"], "PROPOSE");
    assert_eq!(json["value"], 2);
    assert_eq!(json["options"]["validators"], 3);
}

// ─────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────

const COUNTER_NODE: &str = "
    node Counter {
        state counter: u64 = 0;

        function increment() {
            counter <#> counter + 1;
        }

        function get() -> u64 {
            return counter;
        }
    }
";

#[test]
fn test_node_state_mutation_through_methods() {
    let source = format!("{COUNTER_NODE} let c = Counter.new(); c.increment(); return c.get();");
    let (value, _) = run(&source);
    assert_eq!(value, Value::Number(1.0));
}

#[test]
fn test_instances_have_isolated_state() {
    let source = format!(
        "{COUNTER_NODE}
        let a = Counter.new();
        let b = Counter.new();
        a.increment();
        a.increment();
        b.increment();
        return a.get() * 10 + b.get();"
    );
    let (value, _) = run(&source);
    assert_eq!(value, Value::Number(21.0));
}

#[test]
fn test_instance_ids_are_unique_and_registered() {
    let source = format!(
        "{COUNTER_NODE}
        let a = Counter.new();
        let b = Counter.new();
        return [a.id, b.id];"
    );
    let (value, eval) = run(&source);
    let ids = sequence_of(&value);
    assert_eq!(ids[0], Value::Str("node_1".into()));
    assert_eq!(ids[1], Value::Str("node_2".into()));
    assert_eq!(eval.node_ids(), vec!["node_1".to_string(), "node_2".to_string()]);
}

#[test]
fn test_start_marks_running_and_logs() {
    let source = "node W { }
        let w = W.new();
        let before = w.running;
        w.start();
        return [before, w.running];";
    let (value, eval) = run(source);
    assert_eq!(
        sequence_of(&value),
        &[Value::Bool(false), Value::Bool(true)]
    );
    assert!(eval
        .events()
        .contains(&"[Node] Node node_1 Started".to_string()));
}

#[test]
fn test_join_cluster_records_membership_and_logs() {
    let source = "node W { }
        let w = W.new();
        w.join_cluster(\"mainnet\");
        return w.cluster;";
    let (value, eval) = run(source);
    assert_eq!(value, Value::Str("mainnet".into()));
    assert!(eval
        .events()
        .contains(&"[Node] Node node_1 Joined cluster: mainnet".to_string()));
}

#[test]
fn test_synchronized_always_resolves_true() {
    let (value, _) = run("node W { } let w = W.new(); return w.synchronized();");
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn test_self_resolves_to_instance_inside_methods() {
    let source = "node N {
            state n: u64 = 0;
            function bump() {
                self.n = self.n + 1;
                return self.n;
            }
        }
        let a = N.new();
        a.bump();
        return a.bump();";
    let (value, _) = run(source);
    assert_eq!(value, Value::Number(2.0));
}

#[test]
fn test_state_initializers_are_evaluated_at_declaration() {
    let source = "node N { state window: u64 = 2s; }
        let n = N.new();
        return n.window;";
    let (value, _) = run(source);
    assert_eq!(value, Value::Number(2000.0));
}

// ─────────────────────────────────────────────────────────────────────
// Clusters
// ─────────────────────────────────────────────────────────────────────

const RING_CLUSTER: &str = "
    consensus cluster Ring {
        replicas: 3,
        consensus: Consensus::Raft,
        zones: [\"us-east\", \"eu-west\"],

        state total: u64 = 0;

        service add(n: u64) -> u64 {
            total = total + n;
            return total;
        }
    }
";

#[test]
fn test_cluster_descriptor_exposes_properties_and_methods() {
    let source = format!("{RING_CLUSTER} Ring.add(2); return Ring.add(3);");
    let (value, eval) = run(&source);
    // State persists across calls: the descriptor is shared, not
    // instantiated per call.
    assert_eq!(value, Value::Number(5.0));
    assert_eq!(eval.cluster_names(), vec!["Ring".to_string()]);

    let (replicas, _) = run(&format!("{RING_CLUSTER} return Ring.replicas;"));
    assert_eq!(replicas, Value::Number(3.0));
    let (total, _) = run(&format!("{RING_CLUSTER} return Ring.total;"));
    assert_eq!(total, Value::Number(0.0));
}

#[test]
fn test_cluster_declaration_logs_configuration() {
    let (_, eval) = run(RING_CLUSTER);
    assert!(eval.events().contains(
        &"[Cluster] Cluster Ring configured (replicas: 3, consensus: Consensus::Raft)".to_string()
    ));
}

#[test]
fn test_cluster_is_not_instantiable() {
    let mut eval = Evaluator::new();
    let err = eval
        .eval_source(&format!("{RING_CLUSTER} return Ring.new();"))
        .unwrap_err();
    assert!(err.to_string().contains("new"));
}

// ─────────────────────────────────────────────────────────────────────
// Pipelines
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_pipeline_default_transform_tags_provenance() {
    let source = "pipeline Ingest {
            stage clean { }
            stage enrich { }
        }
        return Ingest.execute([1, 2, 3]);";
    let (value, _) = run(source);
    let items = sequence_of(&value);
    assert_eq!(items.len(), 3);
    for (i, item) in items.iter().enumerate() {
        let fields = record_of(item);
        // Original order preserved, provenance set by the final stage.
        assert_eq!(fields.get("value"), Some(&Value::Number((i + 1) as f64)));
        assert_eq!(
            fields.get("processedBy"),
            Some(&Value::Str("enrich".into()))
        );
        assert!(matches!(fields.get("timestamp"), Some(Value::Number(_))));
    }
}

#[test]
fn test_pipeline_custom_process_replaces_data() {
    let source = "function total(xs) {
            let sum = 0;
            for x in xs { sum = sum + x; }
            return sum;
        }
        pipeline Sum {
            stage reduce { process: total }
        }
        return Sum.execute([1, 2, 3, 4]);";
    let (value, _) = run(source);
    assert_eq!(value, Value::Number(10.0));
}

#[test]
fn test_pipeline_stages_run_in_declaration_order() {
    let source = "function first(x) { return x + \"a\"; }
        function second(x) { return x + \"b\"; }
        pipeline P {
            stage one { process: first }
            stage two { process: second }
        }
        return P.execute(\"\");";
    let (value, _) = run(source);
    assert_eq!(value, Value::Str("ab".into()));
}

#[test]
fn test_worker_properties_only_affect_logs() {
    let source = "pipeline P {
            stage fan { parallel: true, workers: 4 }
            stage gpu { gpu_workers: 2 }
        }
        return P.execute([1]);";
    let (value, eval) = run(source);
    // Output is the same sequential transform regardless of workers.
    assert_eq!(sequence_of(&value).len(), 1);
    assert!(eval
        .events()
        .contains(&"[Pipeline] Stage fan scheduled on 4 workers".to_string()));
    assert!(eval
        .events()
        .contains(&"[Pipeline] Stage fan running in parallel".to_string()));
    assert!(eval
        .events()
        .contains(&"[Pipeline] Stage gpu scheduled on 2 GPU workers".to_string()));
    assert!(eval
        .events()
        .contains(&"[Pipeline] Executing pipeline P".to_string()));
}

#[test]
fn test_pipeline_passes_non_sequence_through() {
    let source = "pipeline P { stage s { } } return P.execute(42);";
    let (value, _) = run(source);
    assert_eq!(value, Value::Number(42.0));
}

// ─────────────────────────────────────────────────────────────────────
// Cross-chain contracts
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_contract_method_fans_out_per_chain() {
    let source = "@cross_chain(ethereum, polygon)
        contract Bridge {
            function ping() {
                return current_chain;
            }
        }
        return Bridge.ping();";
    let (value, _) = run(source);
    let fields = record_of(&value);
    assert_eq!(fields.get("success"), Some(&Value::Bool(true)));

    let results = record_of(fields.get("results").unwrap());
    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ethereum", "polygon"]);
    assert_eq!(results.get("ethereum"), Some(&Value::Str("ethereum".into())));
    assert_eq!(results.get("polygon"), Some(&Value::Str("polygon".into())));

    let chains = sequence_of(fields.get("chains").unwrap());
    assert_eq!(
        chains,
        &[Value::Str("ethereum".into()), Value::Str("polygon".into())]
    );
}

#[test]
fn test_deploy_synthesizes_one_address_per_chain() {
    let source = "@cross_chain(ethereum, polygon)
        contract Bridge { }
        return Bridge.deploy();";
    let (value, eval) = run(source);
    let fields = record_of(&value);
    let results = record_of(fields.get("results").unwrap());
    assert_eq!(results.len(), 2);

    let mut addresses = Vec::new();
    for (_, address) in results.iter() {
        match address {
            Value::Str(s) => {
                assert!(s.starts_with("0x"));
                assert_eq!(s.len(), 42);
                addresses.push(s.clone());
            }
            other => panic!("expected address string, got {other:?}"),
        }
    }
    assert_ne!(addresses[0], addresses[1]);

    let deploy_lines = eval
        .events()
        .iter()
        .filter(|l| l.contains("deployed on"))
        .count();
    assert_eq!(deploy_lines, 2);
}

#[test]
fn test_contract_natives_log_and_succeed() {
    let source = "@cross_chain(ethereum, polygon)
        contract Bridge {
            function lock(amount: u64) {
                return lock_tokens(amount);
            }
        }
        return Bridge.lock(50);";
    let (value, eval) = run(source);
    let results = record_of(record_of(&value).get("results").unwrap());
    let eth = record_of(results.get("ethereum").unwrap());
    assert_eq!(eth.get("success"), Some(&Value::Bool(true)));
    assert_eq!(eth.get("locked"), Some(&Value::Number(50.0)));

    let lock_lines = eval
        .events()
        .iter()
        .filter(|l| l.as_str() == "[Contract] Locked 50 tokens")
        .count();
    // Once per chain.
    assert_eq!(lock_lines, 2);
}

#[test]
fn test_contract_without_annotation_runs_on_local() {
    let source = "contract Escrow {
            function hold() { return 1; }
        }
        return Escrow.hold();";
    let (value, _) = run(source);
    let results = record_of(record_of(&value).get("results").unwrap());
    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["local"]);
}

#[test]
fn test_contract_state_is_shared_across_chains_and_calls() {
    let source = "@cross_chain(ethereum, polygon)
        contract Tally {
            state count: u64 = 0;
            function bump() {
                count = count + 1;
                return count;
            }
        }
        Tally.bump();
        return Tally.bump();";
    let (value, _) = run(source);
    let results = record_of(record_of(&value).get("results").unwrap());
    // Two chains per call, second call: counts 3 then 4 in chain order.
    assert_eq!(results.get("ethereum"), Some(&Value::Number(3.0)));
    assert_eq!(results.get("polygon"), Some(&Value::Number(4.0)));
}

// ─────────────────────────────────────────────────────────────────────
// Phases, broadcast, event ordering
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_phase_and_broadcast_logging() {
    let source = "phase prepare {
            broadcast(7);
            broadcast({ kind: \"vote\" });
        }";
    let (_, eval) = run(source);
    assert_eq!(
        eval.events(),
        &[
            "[Phase] Entering phase prepare".to_string(),
            "[Broadcast] Broadcasting 7".to_string(),
            "[Broadcast] Broadcasting {\"kind\":\"vote\"}".to_string(),
        ]
    );
}

#[test]
fn test_event_order_is_deterministic_and_sequential() {
    let source = "node W { }
        let w = W.new();
        w.start();
        w.join_cluster(\"a\");
        1 <!>;";
    let (_, eval) = run(source);
    let events = eval.events();
    assert_eq!(events[0], "[Node] Node node_1 Started");
    assert_eq!(events[1], "[Node] Node node_1 Joined cluster: a");
    assert!(events[2].starts_with("[Consensus] PROPOSE"));
}
