//! End-to-end scenarios through the public facade

use std::collections::HashMap;
use tlai_eval::{
    compute_initial_states, compute_next_states, compute_reachable_states, ReachOptions, State,
    Value,
};

fn none() -> HashMap<String, String> {
    HashMap::new()
}

fn constants(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn module(body: &str) -> String {
    format!("---- MODULE Test ----\n{}\n====", body)
}

fn ints(states: &[State], var: &str) -> Vec<i64> {
    let mut out: Vec<i64> = states
        .iter()
        .map(|s| match s.get(var) {
            Some(Value::Int(n)) => n.try_into().unwrap(),
            other => panic!("expected an integer for {}, got {:?}", var, other),
        })
        .collect();
    out.sort();
    out
}

#[test]
fn counter_steps_one_at_a_time() {
    let src = module("VARIABLE x\nInit == x = 0\nNext == x' = x + 1");
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(ints(&init, "x"), [0]);

    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(ints(&next, "x"), [1]);

    // Unbounded reachability would never terminate; the caller's bound
    // cuts it off
    let reach = compute_reachable_states(
        &src,
        &none(),
        &ReachOptions {
            max_states: Some(10),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(reach.states.len(), 10);
    assert!(!reach.complete);
}

#[test]
fn nondeterministic_init_and_next() {
    let src = module("VARIABLE x\nInit == x \\in {1, 2}\nNext == x' \\in {x, x + 1}");
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(ints(&init, "x"), [1, 2]);

    let from_one = init
        .iter()
        .find(|s| s.get("x") == Some(&Value::int(1)))
        .unwrap();
    let next = compute_next_states(&src, &none(), from_one).unwrap();
    assert_eq!(ints(&next, "x"), [1, 2]);

    let reach = compute_reachable_states(
        &src,
        &none(),
        &ReachOptions {
            max_states: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ints(&reach.states, "x"), [1, 2, 3]);
}

#[test]
fn interleaved_increments_give_two_successors() {
    let src = module(
        "VARIABLES a, b\n\
         Init == a = 0 /\\ b = 0\n\
         Next ==\n  \\/ (a' = a + 1 /\\ UNCHANGED b)\n  \\/ (b' = b + 1 /\\ UNCHANGED a)",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(init.len(), 1);

    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(next.len(), 2);
    let mut pairs: Vec<(i64, i64)> = next
        .iter()
        .map(|s| {
            let a: i64 = match s.get("a").unwrap() {
                Value::Int(n) => n.try_into().unwrap(),
                _ => panic!(),
            };
            let b: i64 = match s.get("b").unwrap() {
                Value::Int(n) => n.try_into().unwrap(),
                _ => panic!(),
            };
            (a, b)
        })
        .collect();
    pairs.sort();
    assert_eq!(pairs, [(0, 1), (1, 0)]);
}

#[test]
fn function_update_per_index() {
    let src = module(
        "CONSTANT N\n\
         VARIABLE f\n\
         Init == f = [i \\in 1..N |-> 0]\n\
         Next == \\E i \\in 1..N : f' = [f EXCEPT ![i] = 1]",
    );
    let consts = constants(&[("N", "2")]);
    let init = compute_initial_states(&src, &consts).unwrap();
    assert_eq!(init.len(), 1);
    let f0 = init[0].get("f").unwrap();
    assert_eq!(f0.apply(&Value::int(1)).unwrap(), Value::int(0));
    assert_eq!(f0.apply(&Value::int(2)).unwrap(), Value::int(0));

    let next = compute_next_states(&src, &consts, &init[0]).unwrap();
    assert_eq!(next.len(), 2);
    let mut images: Vec<(i64, i64)> = next
        .iter()
        .map(|s| {
            let f = s.get("f").unwrap();
            let get = |i: i64| -> i64 {
                match f.apply(&Value::int(i)).unwrap() {
                    Value::Int(n) => (&n).try_into().unwrap(),
                    _ => panic!(),
                }
            };
            (get(1), get(2))
        })
        .collect();
    images.sort();
    assert_eq!(images, [(0, 1), (1, 0)]);
}

#[test]
fn record_field_update() {
    let src = module(
        "VARIABLE r\n\
         Init == r = [a |-> 0, b |-> 0]\n\
         Next == r' = [r EXCEPT !.a = r.a + 1]",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(next.len(), 1);
    let r = next[0].get("r").unwrap();
    assert_eq!(r.apply(&Value::str("a")).unwrap(), Value::int(1));
    assert_eq!(r.apply(&Value::str("b")).unwrap(), Value::int(0));
}

#[test]
fn sequence_grows_by_one_each_step() {
    let src = module("VARIABLE s\nInit == s = <<>>\nNext == s' = Append(s, 1)");
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(init[0].get("s").unwrap().as_seq().unwrap().len(), 0);

    let step1 = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(step1.len(), 1);
    assert_eq!(
        step1[0].get("s").unwrap().as_seq().unwrap(),
        vec![Value::int(1)]
    );

    let step2 = compute_next_states(&src, &none(), &step1[0]).unwrap();
    assert_eq!(
        step2[0].get("s").unwrap().as_seq().unwrap(),
        vec![Value::int(1), Value::int(1)]
    );
}

#[test]
fn redundant_init_disjuncts_do_not_duplicate_states() {
    let src = module("VARIABLE x\nInit == x = 0 \\/ x = 0\nNext == x' = x");
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(init.len(), 1);
}

#[test]
fn reachability_is_closed() {
    let src = module("VARIABLE x\nInit == x = 0\nNext == x' = (x + 1) % 3");
    let reach = compute_reachable_states(&src, &none(), &ReachOptions::default()).unwrap();
    assert!(reach.complete);
    assert_eq!(ints(&reach.states, "x"), [0, 1, 2]);

    // Closure: every successor of a reachable state is reachable
    let fps: Vec<_> = reach.states.iter().map(|s| s.fingerprint()).collect();
    for state in &reach.states {
        for succ in compute_next_states(&src, &none(), state).unwrap() {
            assert!(fps.contains(&succ.fingerprint()));
        }
    }

    // Edges land inside the reachable set too
    for (from, to) in &reach.edges {
        assert!(fps.contains(from));
        assert!(fps.contains(to));
    }
}

#[test]
fn incomplete_primed_assignment_is_discarded() {
    // The second action never assigns y', so it contributes nothing
    let src = module(
        "VARIABLES x, y\n\
         Init == x = 0 /\\ y = 0\n\
         Next ==\n  \\/ (x' = x + 1 /\\ y' = y)\n  \\/ x' = 9",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].get("x"), Some(&Value::int(1)));
}

#[test]
fn guarded_actions_disable_when_false() {
    let src = module(
        "VARIABLE x\n\
         Init == x = 0\n\
         Next ==\n  \\/ (x < 2 /\\ x' = x + 1)\n  \\/ (x = 2 /\\ x' = 0)",
    );
    let reach = compute_reachable_states(&src, &none(), &ReachOptions::default()).unwrap();
    assert!(reach.complete);
    assert_eq!(ints(&reach.states, "x"), [0, 1, 2]);
}

#[test]
fn dfs_visits_the_same_states_as_bfs() {
    let src = module(
        "VARIABLE x\nInit == x = 0\nNext == x' \\in {(x + 1) % 4, (x + 2) % 4}",
    );
    let bfs = compute_reachable_states(&src, &none(), &ReachOptions::default()).unwrap();
    let dfs = compute_reachable_states(
        &src,
        &none(),
        &ReachOptions {
            dfs: true,
            ..Default::default()
        },
    )
    .unwrap();
    let mut bfs_fps: Vec<_> = bfs.states.iter().map(|s| s.fingerprint()).collect();
    let mut dfs_fps: Vec<_> = dfs.states.iter().map(|s| s.fingerprint()).collect();
    bfs_fps.sort();
    dfs_fps.sort();
    assert_eq!(bfs_fps, dfs_fps);
}

#[test]
fn operator_definitions_and_let() {
    let src = module(
        "VARIABLE x\n\
         Inc(n) == n + 1\n\
         Init == x = LET base == 40 IN Inc(base) + 1\n\
         Next == x' = Inc(x)",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(ints(&init, "x"), [42]);
    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(ints(&next, "x"), [43]);
}

#[test]
fn action_named_in_next_is_expanded() {
    let src = module(
        "VARIABLES x, y\n\
         Init == x = 0 /\\ y = 0\n\
         IncX == x' = x + 1 /\\ UNCHANGED y\n\
         IncY == y' = y + 1 /\\ UNCHANGED x\n\
         Next == IncX \\/ IncY",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    let next = compute_next_states(&src, &none(), &init[0]).unwrap();
    assert_eq!(next.len(), 2);
}

#[test]
fn comments_are_ignored() {
    let src = module(
        "VARIABLE x \\* the only variable\n\
         (* Init pins x\n   to zero *)\n\
         Init == x = 0\n\
         Next == x' = x",
    );
    let init = compute_initial_states(&src, &none()).unwrap();
    assert_eq!(ints(&init, "x"), [0]);
}
