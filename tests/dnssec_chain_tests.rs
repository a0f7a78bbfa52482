mod common;

use common::*;
use openalias::dns::enums::{DNSResourceType, ResponseCode};
use openalias::dnssec::denial::nsec3_label;
use openalias::dnssec::records::Nsec3;
use openalias::{
    CanonicalName, DnsTransport, DnssecStatus, DnssecVerifier, QueryClient, RawTxtAnswer,
    TrustAnchorStore,
};
use std::sync::Arc;

fn verifier(transport: &Arc<MockTransport>, anchors: Arc<TrustAnchorStore>) -> DnssecVerifier {
    let transport: Arc<dyn DnsTransport> = transport.clone();
    DnssecVerifier::new(QueryClient::new(transport, fast_policy()), anchors)
}

fn target() -> CanonicalName {
    CanonicalName::new("pay.example.com")
}

#[tokio::test]
async fn test_signed_txt_is_secure() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    tree.script_signed_txt(&transport, "pay.example.com", &[PAY_RECORD, "v=spf1 -all"]);

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;

    assert_eq!(verdict.status, DnssecStatus::Secure);
    assert_eq!(
        verdict.authenticated,
        Some(vec![
            RawTxtAnswer::new(PAY_RECORD),
            RawTxtAnswer::new("v=spf1 -all")
        ])
    );
    assert_eq!(transport.queries(".", DNSResourceType::DNSKEY), 1);
    assert_eq!(transport.queries("example.com", DNSResourceType::DS), 1);
}

#[tokio::test]
async fn test_tampered_txt_is_bogus() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);

    let signed = vec![txt("pay.example.com", PAY_RECORD)];
    let sig = tree.example.sign(&signed);
    let forged = txt(
        "pay.example.com",
        "oa1:xmr recipient_address=attacker; recipient_name=Evil; tx_description=x;",
    );
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::TXT,
        ResponseCode::NoError,
        vec![forged, sig],
        Vec::new(),
    ));
    transport.respond(tree.example.nodata_response(
        "pay.example.com",
        DNSResourceType::DS,
        "zz.example.com",
        &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    ));

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;
    assert_eq!(verdict.status, DnssecStatus::Bogus);
    assert_eq!(verdict.authenticated, None);
}

#[tokio::test]
async fn test_expired_signature_is_bogus() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);

    let records = vec![txt("pay.example.com", PAY_RECORD)];
    let sig = tree.example.sign_in_window(&records, Window::expired());
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::TXT,
        ResponseCode::NoError,
        vec![records[0].clone(), sig],
        Vec::new(),
    ));
    transport.respond(tree.example.nodata_response(
        "pay.example.com",
        DNSResourceType::DS,
        "zz.example.com",
        &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    ));

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Bogus);
}

#[tokio::test]
async fn test_unsigned_txt_in_signed_zone_is_bogus() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::TXT,
        ResponseCode::NoError,
        vec![txt("pay.example.com", PAY_RECORD)],
        Vec::new(),
    ));
    transport.respond(tree.example.nodata_response(
        "pay.example.com",
        DNSResourceType::DS,
        "zz.example.com",
        &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    ));

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Bogus);
}

#[tokio::test]
async fn test_signed_non_utf8_txt_is_bogus() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::TXT,
        ResponseCode::NoError,
        tree.example
            .signed(vec![txt_bytes("pay.example.com", NON_UTF8_RECORD)]),
        Vec::new(),
    ));
    transport.respond(tree.example.nodata_response(
        "pay.example.com",
        DNSResourceType::DS,
        "zz.example.com",
        &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    ));

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;
    assert_eq!(verdict.status, DnssecStatus::Bogus);
    assert_eq!(verdict.authenticated, None);
}

#[tokio::test]
async fn test_ds_not_matching_child_key_is_bogus() {
    let tree = SignedTree::new();
    let impostor = TestZone::new("example.com");
    let transport = MockTransport::new();

    transport.respond(tree.root.dnskey_response());
    transport.respond(tree.root.delegation_response(&tree.com));
    transport.respond(tree.com.dnskey_response());
    transport.respond(tree.com.delegation_response(&tree.example));
    // The child serves keys the parent's DS does not vouch for
    transport.respond(impostor.dnskey_response());

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Bogus);
    assert_eq!(transport.queries("pay.example.com", DNSResourceType::TXT), 0);
}

#[tokio::test]
async fn test_unsigned_delegation_is_insecure() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    transport.respond(tree.root.dnskey_response());
    transport.respond(tree.root.delegation_response(&tree.com));
    transport.respond(tree.com.dnskey_response());
    // com proves example.com is delegated without a DS
    transport.respond(tree.com.nodata_response(
        "example.com",
        DNSResourceType::DS,
        "f.com",
        &[DNSResourceType::NS, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    ));

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Insecure);
}

#[tokio::test]
async fn test_no_covering_anchor_is_indeterminate() {
    let transport = MockTransport::new();
    let anchors = Arc::new(TrustAnchorStore::empty());

    let status = verifier(&transport, anchors).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Indeterminate);
    assert_eq!(transport.total_queries(), 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_indeterminate() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    transport.script(".", DNSResourceType::DNSKEY, Scripted::Hang);

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Indeterminate);
    assert_eq!(transport.queries(".", DNSResourceType::DNSKEY), 3);
}

#[tokio::test]
async fn test_servfail_then_answer_is_retried() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    transport.respond(response(
        ".",
        DNSResourceType::DNSKEY,
        ResponseCode::ServerFailure,
        Vec::new(),
        Vec::new(),
    ));
    tree.script_chain(&transport);
    tree.script_signed_txt(&transport, "pay.example.com", &[PAY_RECORD]);

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Secure);
    assert_eq!(transport.queries(".", DNSResourceType::DNSKEY), 2);
}

#[tokio::test]
async fn test_nonexistent_name_is_proven_secure() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::DS,
        ResponseCode::NameError,
        Vec::new(),
        tree.example.signed(vec![nsec(
            "example.com",
            "zz.example.com",
            &[
                DNSResourceType::NS,
                DNSResourceType::SOA,
                DNSResourceType::RRSIG,
                DNSResourceType::NSEC,
                DNSResourceType::DNSKEY,
            ],
        )]),
    ));

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;
    assert_eq!(verdict.status, DnssecStatus::Secure);
    assert_eq!(verdict.authenticated, Some(Vec::new()));
}

#[tokio::test]
async fn test_wildcard_expanded_txt_is_secure() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);

    // example.com -> *.example.com -> (wraps to) example.com
    let apex_nsec = tree.example.signed(vec![nsec(
        "example.com",
        "*.example.com",
        &[
            DNSResourceType::NS,
            DNSResourceType::SOA,
            DNSResourceType::RRSIG,
            DNSResourceType::NSEC,
            DNSResourceType::DNSKEY,
        ],
    )]);
    let wildcard_nsec = tree.example.signed(vec![nsec(
        "*.example.com",
        "example.com",
        &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
    )]);

    let mut ds_denial = apex_nsec;
    ds_denial.extend(wildcard_nsec.clone());
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::DS,
        ResponseCode::NoError,
        Vec::new(),
        ds_denial,
    ));

    let records = vec![txt("pay.example.com", PAY_RECORD)];
    let sig = tree.example.sign_wildcard(&records, "example.com");
    transport.respond(response(
        "pay.example.com",
        DNSResourceType::TXT,
        ResponseCode::NoError,
        vec![records[0].clone(), sig],
        wildcard_nsec,
    ));

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;
    assert_eq!(verdict.status, DnssecStatus::Secure);
    assert_eq!(verdict.authenticated, Some(vec![RawTxtAnswer::new(PAY_RECORD)]));
}

fn nsec3_at(name: &str, iterations: u16, types: &[DNSResourceType]) -> Nsec3 {
    let salt = vec![0xaa, 0xbb];
    let label = nsec3_label(name, &salt, iterations).unwrap();
    let mut next_hashed = base32_hex_decode(&label);
    // Any successor works for a matching proof
    if let Some(last) = next_hashed.last_mut() {
        *last = last.wrapping_add(1);
    }
    Nsec3 {
        hash_algorithm: 1,
        flags: 0,
        iterations,
        salt,
        next_hashed,
        types: types.to_vec(),
    }
}

fn base32_hex_decode(label: &str) -> Vec<u8> {
    base32::decode(
        base32::Alphabet::Rfc4648Hex { padding: false },
        &label.to_ascii_uppercase(),
    )
    .unwrap()
}

fn script_nsec3_nodata(tree: &SignedTree, transport: &MockTransport, iterations: u16) {
    let record = nsec3_at(
        "pay.example.com",
        iterations,
        &[DNSResourceType::A, DNSResourceType::RRSIG],
    );
    let owner = format!(
        "{}.example.com",
        nsec3_label("pay.example.com", &record.salt, iterations).unwrap()
    );
    let authority = tree.example.signed(vec![nsec3(&owner, &record)]);

    for qtype in [DNSResourceType::DS, DNSResourceType::TXT] {
        transport.respond(response(
            "pay.example.com",
            qtype,
            ResponseCode::NoError,
            Vec::new(),
            authority.clone(),
        ));
    }
}

#[tokio::test]
async fn test_nsec3_nodata_is_secure_and_empty() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    script_nsec3_nodata(&tree, &transport, 5);

    let verdict = verifier(&transport, tree.anchors())
        .verify_detailed(&target())
        .await;
    assert_eq!(verdict.status, DnssecStatus::Secure);
    assert_eq!(verdict.authenticated, Some(Vec::new()));
}

#[tokio::test]
async fn test_nsec3_excessive_iterations_is_insecure() {
    let tree = SignedTree::new();
    let transport = MockTransport::new();
    tree.script_chain(&transport);
    script_nsec3_nodata(&tree, &transport, 151);

    let status = verifier(&transport, tree.anchors()).verify(&target()).await;
    assert_eq!(status, DnssecStatus::Insecure);
}
