use super::ring::HashRing;

/// Parses the hashed text as a decimal number, so virtual-node positions
/// are readable in the assertions below.
fn parse_hash(bytes: &[u8]) -> u32 {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[test]
fn ring_routes_keys_clockwise() {
    let mut ring = HashRing::new(3, Some(parse_hash));
    // Virtual nodes: 2, 12, 22, 4, 14, 24, 6, 16, 26.
    ring.add(["6", "4", "2"]);

    let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
    for (key, want) in cases {
        assert_eq!(ring.get(key), Some(want), "key {key}");
    }

    // A new peer at 8, 18, 28 captures "27".
    ring.add(["8"]);
    let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "8")];
    for (key, want) in cases {
        assert_eq!(ring.get(key), Some(want), "key {key}");
    }
}

#[test]
fn ring_is_deterministic() {
    let mut a = HashRing::new(50, None);
    let mut b = HashRing::new(50, None);
    a.add(["alpha", "beta", "gamma"]);
    b.add(["alpha", "beta", "gamma"]);

    for i in 0..200 {
        let key = format!("key-{i}");
        assert_eq!(a.get(&key), b.get(&key));
    }
}

#[test]
fn ring_holds_replicas_per_peer() {
    let mut ring = HashRing::new(50, None);
    assert!(ring.is_empty());
    assert_eq!(ring.get("anything"), None);

    ring.add(["a", "b", "c"]);
    assert_eq!(ring.len(), 3 * 50);
}

#[test]
fn ring_lookup_only_returns_known_peers() {
    let mut ring = HashRing::new(13, None);
    ring.add(["node-1", "node-2"]);

    for i in 0..100 {
        let owner = ring.get(&format!("key-{i}")).unwrap();
        assert!(owner == "node-1" || owner == "node-2");
    }
}
