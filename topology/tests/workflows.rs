// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! End-to-end workflow scenarios against in-memory collaborators.

use config::{ClusterConfig, GatewayConfig};
use ipam::Mac;
use ipnet::Ipv4Net;
use nb::testing::{FakeNb, Row};
use nb::{Nb, NbTable};
use netcfg::testing::FakeConfigurator;
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use topology::{names, GatewayInit, MasterInit, MinionInit, TopologyError};
use tracing_test::traced_test;
use vswitch::testing::FakeVs;
use vswitch::Vs;

const CLUSTER_SUBNET: &str = "10.0.0.0/14";

fn cluster(node: &str) -> ClusterConfig {
    ClusterConfig::new(CLUSTER_SUBNET.parse().unwrap(), node).unwrap()
}

fn gateway_config(bridge: Option<&str>, physical: Option<&str>) -> GatewayConfig {
    GatewayConfig {
        physical_interface: physical.map(str::to_string),
        bridge_interface: bridge.map(str::to_string),
        physical_ip: "192.168.1.5/24".parse().unwrap(),
        default_gateway: None,
        rampout_subnets: vec![],
    }
}

fn run_master(nb: &Nb<FakeNb>, netcfg: &FakeConfigurator, node: &str, subnet: &str) {
    let cluster = cluster(node);
    MasterInit::new(nb, netcfg, &cluster, subnet.parse().unwrap())
        .run()
        .unwrap();
}

fn run_gateway(
    nb: &Nb<FakeNb>,
    vs: &Vs<FakeVs>,
    netcfg: &FakeConfigurator,
    node: &str,
    config: &GatewayConfig,
) -> Result<(), TopologyError> {
    let cluster = cluster(node);
    GatewayInit::new(nb, vs, netcfg, &cluster, config).run()
}

/// A vswitch with the integration bridge and a provider bridge.
fn external_vswitch() -> Vs<FakeVs> {
    let vs = Vs::new(FakeVs::with_chassis("chassis-1"));
    vs.ensure_bridge("br-int").unwrap();
    vs.ensure_bridge("br-ex").unwrap();
    vs
}

fn routes_of(nb: &Nb<FakeNb>, router: &str) -> Vec<Row> {
    nb.transport()
        .rows(NbTable::LogicalRouterStaticRoute)
        .into_iter()
        .filter(|row| row.field("router") == Some(router))
        .collect()
}

#[test]
fn master_builds_the_cluster_singletons() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let routers = nb.transport().rows(NbTable::LogicalRouter);
    assert_eq!(routers.len(), 1);
    assert_eq!(routers[0].field(names::TAG_CLUSTER_ROUTER), Some("yes"));
    assert_eq!(routers[0].name(), Some("cluster-router"));

    assert_eq!(nb.transport().count(NbTable::LoadBalancer), 2);

    let join = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitch, names::JOIN_SWITCH)
        .unwrap();
    assert_eq!(join.field("other-config:subnet"), Some("100.64.1.0/24"));

    let rtoj = nb
        .transport()
        .row_by_name(NbTable::LogicalRouterPort, "rtoj-cluster-router")
        .unwrap();
    assert_eq!(rtoj.field("networks"), Some("100.64.1.1/24"));
    assert_eq!(rtoj.field(names::TAG_CONNECT_TO_JOIN), Some("yes"));

    let node_switch = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitch, "m1")
        .unwrap();
    assert_eq!(node_switch.field("other-config:subnet"), Some("10.1.0.0/24"));
    assert_eq!(node_switch.field("external_ids:gateway_ip"), Some("10.1.0.1/24"));
    assert_eq!(node_switch.sets["load_balancer"].len(), 2);
}

#[test]
fn master_provisions_its_own_management_port() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let mac = FakeConfigurator::mac_for("k8s-m1");
    let host_port = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitchPort, "k8s-m1")
        .unwrap();
    assert!(host_port.sets["addresses"].contains(&format!("{mac} 10.1.0.2")));

    let stor = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitchPort, "stor-m1")
        .unwrap();
    assert_eq!(stor.field("type"), Some("router"));
    assert_eq!(stor.field("options:router-port"), Some("rtos-m1"));

    assert_eq!(netcfg.ensured(), [("br-int".to_string(), "k8s-m1".to_string())]);
    let configured = netcfg.configured();
    assert_eq!(configured.len(), 1);
    assert_eq!(configured[0].port, "k8s-m1");
    assert_eq!(configured[0].address, "10.1.0.2/24".parse::<Ipv4Net>().unwrap());
    assert_eq!(
        configured[0].cluster_subnet,
        CLUSTER_SUBNET.parse::<Ipv4Net>().unwrap()
    );
    assert_eq!(configured[0].router_ip, "10.1.0.1".parse::<Ipv4Addr>().unwrap());
}

#[test]
fn master_rerun_reaches_the_same_store_state() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let first = nb.transport().snapshot();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    assert_eq!(nb.transport().snapshot(), first);
}

#[test]
fn minion_extends_an_existing_cluster() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let minion = cluster("w1");
    MinionInit::new(&nb, &netcfg, &minion, "10.2.0.0/24".parse().unwrap(), None)
        .run()
        .unwrap();

    // still one router, still two load balancers
    assert_eq!(nb.transport().count(NbTable::LogicalRouter), 1);
    assert_eq!(nb.transport().count(NbTable::LoadBalancer), 2);

    let switch = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitch, "w1")
        .unwrap();
    assert_eq!(switch.field("external_ids:gateway_ip"), Some("10.2.0.1/24"));
    assert_eq!(switch.sets["load_balancer"].len(), 2);
}

#[test]
fn minion_writes_the_cni_descriptor() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let dir = tempfile::tempdir().unwrap();
    let plugin = dir.path().join("overlay-cni");
    std::fs::write(&plugin, "#!/bin/sh\n").unwrap();
    let install = topology::CniInstall {
        plugin_source: plugin,
        plugin_dir: dir.path().join("plugins"),
        conf_dir: dir.path().join("net.d"),
    };
    let minion = cluster("w1");
    MinionInit::new(
        &nb,
        &netcfg,
        &minion,
        "10.2.0.0/24".parse().unwrap(),
        Some(install),
    )
    .run()
    .unwrap();

    let conf = dir.path().join("net.d").join(netcfg::cni::CONF_FILE);
    let body = std::fs::read_to_string(conf).unwrap();
    assert!(body.contains("\"subnet\": \"10.2.0.0/24\""));
    assert!(dir.path().join("plugins").join("overlay-cni").exists());
}

#[test]
fn minion_without_a_cluster_router_fails_discovery() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    let minion = cluster("w1");
    let err = MinionInit::new(&nb, &netcfg, &minion, "10.2.0.0/24".parse().unwrap(), None)
        .run()
        .unwrap_err();
    assert!(matches!(err, TopologyError::Discovery("cluster router")));
}

#[test]
fn gateway_via_bridge_builds_router_nat_and_external_switch() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let vs = external_vswitch();
    run_gateway(&nb, &vs, &netcfg, "g1", &gateway_config(Some("br-ex"), None)).unwrap();

    let gr = nb
        .transport()
        .row_by_name(NbTable::LogicalRouter, "GR_g1")
        .unwrap();
    assert_eq!(gr.field("options:chassis"), Some("chassis-1"));
    assert_eq!(gr.field(names::TAG_PHYSICAL_IP), Some("192.168.1.5"));
    assert_eq!(gr.field(names::TAG_FIRST_GATEWAY), Some("yes"));
    // first allocation after the distributed router's fixed address
    assert_eq!(gr.field("options:lb_force_snat_ip"), Some("100.64.1.2"));
    assert_eq!(gr.sets["load_balancer"].len(), 2);

    let nat = nb.transport().rows(NbTable::Nat);
    assert_eq!(nat.len(), 1);
    assert_eq!(nat[0].field("router"), Some("GR_g1"));
    assert_eq!(nat[0].field("external_ip"), Some("192.168.1.5"));
    assert_eq!(nat[0].field("logical_ip"), Some(CLUSTER_SUBNET));

    assert!(nb
        .transport()
        .row_by_name(NbTable::LogicalSwitch, "ext_g1")
        .is_some());
    let learning = nb
        .transport()
        .row_by_name(NbTable::LogicalSwitchPort, "br-ex_g1")
        .unwrap();
    assert!(learning.sets["addresses"].contains("unknown"));

    // the external router port carries the pinned bridge MAC
    let pinned: Mac = vs
        .transport()
        .bridge_field("br-ex", "other-config:hwaddr")
        .unwrap()
        .parse()
        .unwrap();
    let rtoe = nb
        .transport()
        .row_by_name(NbTable::LogicalRouterPort, "rtoe-GR_g1")
        .unwrap();
    assert_eq!(rtoe.field("mac"), Some(pinned.to_string().as_str()));
    assert_eq!(rtoe.field("networks"), Some("192.168.1.5/24"));

    // patch pair into the integration bridge
    assert!(vs.transport().port("patch-br-int-to-br-ex").is_some());
    assert!(vs.transport().port("patch-br-ex-to-br-int").is_some());
}

#[test]
fn gateway_routes_cluster_traffic_through_the_join_switch() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let vs = external_vswitch();
    run_gateway(&nb, &vs, &netcfg, "g1", &gateway_config(Some("br-ex"), None)).unwrap();

    let gr_routes = routes_of(&nb, "GR_g1");
    assert_eq!(gr_routes.len(), 1);
    assert_eq!(gr_routes[0].field("ip_prefix"), Some(CLUSTER_SUBNET));
    assert_eq!(gr_routes[0].field("nexthop"), Some("100.64.1.1"));

    let router_uuid = nb
        .transport()
        .row_by_name(NbTable::LogicalRouter, "cluster-router")
        .unwrap()
        .uuid;
    let default_routes = routes_of(&nb, &router_uuid);
    assert_eq!(default_routes.len(), 1);
    assert_eq!(default_routes[0].field("ip_prefix"), Some("0.0.0.0/0"));
    assert_eq!(default_routes[0].field("nexthop"), Some("100.64.1.2"));
}

#[test]
fn gateway_via_physical_interface_flushes_its_addressing() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    let vs = Vs::new(FakeVs::with_chassis("chassis-1"));
    vs.ensure_bridge("br-int").unwrap();
    vs.transport()
        .preset_interface_field("eth1", "mac_in_use", "02:42:ac:11:00:02");
    run_gateway(&nb, &vs, &netcfg, "g1", &gateway_config(None, Some("eth1"))).unwrap();

    assert_eq!(netcfg.flushed(), ["eth1".to_string()]);
    let attached = vs.transport().port("eth1").unwrap();
    assert_eq!(attached.bridge, "br-int");
    assert_eq!(attached.fields.get("external_ids:iface-id").unwrap(), "eth1_g1");

    let rtoe = nb
        .transport()
        .row_by_name(NbTable::LogicalRouterPort, "rtoe-GR_g1")
        .unwrap();
    assert_eq!(rtoe.field("mac"), Some("02:42:ac:11:00:02"));
}

#[test]
fn gateway_rerun_reaches_the_same_store_state() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let vs = external_vswitch();
    let config = gateway_config(Some("br-ex"), None);

    run_gateway(&nb, &vs, &netcfg, "g1", &config).unwrap();
    let first = nb.transport().snapshot();
    run_gateway(&nb, &vs, &netcfg, "g1", &config).unwrap();
    assert_eq!(nb.transport().snapshot(), first);
}

#[test]
fn sequential_gateways_hold_distinct_join_addresses() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let vs = external_vswitch();

    for node in ["g1", "g2", "g3"] {
        run_gateway(&nb, &vs, &netcfg, node, &gateway_config(Some("br-ex"), None)).unwrap();
    }

    let mut addresses: Vec<String> = ["GR_g1", "GR_g2", "GR_g3"]
        .iter()
        .map(|gr| {
            nb.transport()
                .row_by_name(NbTable::LogicalRouterPort, &names::rtoj(gr))
                .unwrap()
                .field("networks")
                .unwrap()
                .to_string()
        })
        .collect();
    addresses.sort();
    assert_eq!(addresses, ["100.64.1.2/24", "100.64.1.3/24", "100.64.1.4/24"]);

    // only the first gateway carries the flag
    let flags: Vec<Option<String>> = ["GR_g1", "GR_g2", "GR_g3"]
        .iter()
        .map(|gr| {
            nb.transport()
                .row_by_name(NbTable::LogicalRouter, gr)
                .unwrap()
                .field(names::TAG_FIRST_GATEWAY)
                .map(str::to_string)
        })
        .collect();
    assert_eq!(
        flags,
        [
            Some("yes".to_string()),
            Some("no".to_string()),
            Some("no".to_string())
        ]
    );
}

#[test]
fn gateway_interface_selection_failure_mutates_nothing() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let before = nb.transport().snapshot();
    let vs = external_vswitch();

    for config in [
        gateway_config(Some("br-ex"), Some("eth1")),
        gateway_config(None, None),
    ] {
        let err = run_gateway(&nb, &vs, &netcfg, "g1", &config).unwrap_err();
        assert!(matches!(err, TopologyError::Config(_)));
    }
    assert_eq!(nb.transport().snapshot(), before);
}

#[test]
fn gateway_without_chassis_identity_fails_discovery() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let before = nb.transport().snapshot();

    let vs = Vs::new(FakeVs::new());
    let err = run_gateway(&nb, &vs, &netcfg, "g1", &gateway_config(Some("br-ex"), None))
        .unwrap_err();
    assert!(matches!(err, TopologyError::Discovery("chassis identity")));
    assert_eq!(nb.transport().snapshot(), before);
}

#[test]
fn exhausted_join_pool_creates_no_partial_port() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");

    // claim every remaining join address
    for host in 2u8..=254 {
        let port = format!("rtoj-GR_filler{host}");
        nb.lrp_add(
            "cluster-router",
            &port,
            Mac::random_unicast(),
            &format!("100.64.1.{host}/24"),
        )
        .unwrap();
        nb.set(
            NbTable::LogicalRouterPort,
            &port,
            &[(names::TAG_CONNECT_TO_JOIN, "yes")],
        )
        .unwrap();
    }

    let vs = external_vswitch();
    let err = run_gateway(&nb, &vs, &netcfg, "g1", &gateway_config(Some("br-ex"), None))
        .unwrap_err();
    assert!(matches!(err, TopologyError::Address(_)));
    assert!(nb
        .transport()
        .row_by_name(NbTable::LogicalRouterPort, "rtoj-GR_g1")
        .is_none());
}

#[test]
#[traced_test]
fn malformed_rampout_subnets_are_skipped_with_a_warning() {
    let nb = Nb::new(FakeNb::new());
    let netcfg = FakeConfigurator::new();
    run_master(&nb, &netcfg, "m1", "10.1.0.0/24");
    let vs = external_vswitch();

    let mut config = gateway_config(Some("br-ex"), None);
    config.rampout_subnets = vec![
        "10.130.0.0/23".to_string(),
        "not-a-subnet".to_string(),
        "10.132.0.0/23".to_string(),
    ];
    run_gateway(&nb, &vs, &netcfg, "g1", &config).unwrap();

    let router_uuid = nb
        .transport()
        .row_by_name(NbTable::LogicalRouter, "cluster-router")
        .unwrap()
        .uuid;
    let src_routes: Vec<Row> = routes_of(&nb, &router_uuid)
        .into_iter()
        .filter(|row| row.field("policy") == Some("src-ip"))
        .collect();
    let mut prefixes: Vec<&str> = src_routes
        .iter()
        .filter_map(|row| row.field("ip_prefix"))
        .collect();
    prefixes.sort_unstable();
    assert_eq!(prefixes, ["10.130.0.0/23", "10.132.0.0/23"]);
    for route in &src_routes {
        assert_eq!(route.field("nexthop"), Some("100.64.1.2"));
    }
    assert!(logs_contain("skipping unparsable rampout subnet"));
}
