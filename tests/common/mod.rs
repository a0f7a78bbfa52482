//! Common test utilities: a scripted in-memory transport and a small signed
//! zone hierarchy (`.`, `com`, `example.com`) using Ed25519 keys.

#![allow(dead_code)] // Each test binary uses a different subset

use async_trait::async_trait;
use openalias::dns::{
    DNSPacket,
    enums::{DNSResourceType, ResponseCode},
    name,
    rdata::encode_txt,
    resource::DNSResource,
};
use openalias::dnssec::{
    DigestType,
    records::{DnsKey, Ds, Nsec, Nsec3, Rrsig},
    trust_anchor::{TrustAnchor, TrustAnchorStore},
};
use openalias::lookup::RetryPolicy;
use openalias::{AliasResolver, DnsTransport, TransportError};
use parking_lot::Mutex;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const TTL: u32 = 300;

pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32
}

/// Short timeouts and delays so retry tests finish quickly
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        query_timeout: Duration::from_millis(50),
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[derive(Clone)]
pub enum Scripted {
    Respond(DNSPacket),
    Fail(TransportError),
    /// Never answers; the caller's timeout has to fire
    Hang,
}

type Key = (String, u16);

fn key(name: &str, rtype: DNSResourceType) -> Key {
    (
        name::from_labels(&name::labels(name)).to_ascii_lowercase(),
        u16::from(rtype),
    )
}

/// In-memory `DnsTransport`. Each (name, type) has a queue of scripted
/// outcomes; the last one repeats. Unscripted queries are rejected.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<Key, VecDeque<Scripted>>>,
    counts: Mutex<HashMap<Key, usize>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, name: &str, rtype: DNSResourceType, outcome: Scripted) {
        self.scripts
            .lock()
            .entry(key(name, rtype))
            .or_default()
            .push_back(outcome);
    }

    pub fn respond(&self, packet: DNSPacket) {
        let question = &packet.questions[0];
        let (name, rtype) = (question.name(), question.qtype);
        self.script(&name, rtype, Scripted::Respond(packet));
    }

    pub fn queries(&self, name: &str, rtype: DNSResourceType) -> usize {
        self.counts
            .lock()
            .get(&key(name, rtype))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_queries(&self) -> usize {
        self.counts.lock().values().sum()
    }

    fn next(&self, name: &str, rtype: DNSResourceType) -> Option<Scripted> {
        let k = key(name, rtype);
        *self.counts.lock().entry(k.clone()).or_default() += 1;
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(&k)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl DnsTransport for MockTransport {
    async fn query(
        &self,
        name: &str,
        rtype: DNSResourceType,
    ) -> Result<DNSPacket, TransportError> {
        match self.next(name, rtype) {
            Some(Scripted::Respond(packet)) => Ok(packet),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(TransportError::Rejected(format!(
                "unscripted query {} {}",
                name, rtype
            ))),
        }
    }
}

pub fn response(
    qname: &str,
    qtype: DNSResourceType,
    rcode: ResponseCode,
    answers: Vec<DNSResource>,
    authorities: Vec<DNSResource>,
) -> DNSPacket {
    let mut packet = DNSPacket::query(1, qname, qtype, 1232, true);
    packet.header.qr = true;
    packet.header.ra = true;
    packet.header.rcode = rcode.to_u8();
    packet.answers = answers;
    packet.authorities = authorities;
    packet
}

pub fn txt(owner: &str, text: &str) -> DNSResource {
    DNSResource::new(owner, DNSResourceType::TXT, TTL, encode_txt(text))
}

/// A single character-string TXT record carrying arbitrary bytes
pub fn txt_bytes(owner: &str, bytes: &[u8]) -> DNSResource {
    let mut rdata = vec![bytes.len() as u8];
    rdata.extend_from_slice(bytes);
    DNSResource::new(owner, DNSResourceType::TXT, TTL, rdata)
}

pub fn nsec(owner: &str, next: &str, types: &[DNSResourceType]) -> DNSResource {
    let rdata = Nsec {
        next: next.to_string(),
        types: types.to_vec(),
    }
    .to_rdata()
    .unwrap();
    DNSResource::new(owner, DNSResourceType::NSEC, TTL, rdata)
}

pub fn nsec3(owner: &str, record: &Nsec3) -> DNSResource {
    DNSResource::new(owner, DNSResourceType::NSEC3, TTL, record.to_rdata())
}

struct SigningKey {
    pair: Ed25519KeyPair,
    key: DnsKey,
}

impl SigningKey {
    fn generate(flags: u16) -> Self {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let key = DnsKey {
            flags,
            protocol: 3,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Self { pair, key }
    }
}

/// Validity window of generated signatures
#[derive(Clone, Copy)]
pub struct Window {
    pub inception: u32,
    pub expiration: u32,
}

impl Window {
    pub fn current() -> Self {
        Self {
            inception: now() - 3600,
            expiration: now() + 86_400,
        }
    }

    pub fn expired() -> Self {
        Self {
            inception: now() - 2 * 86_400,
            expiration: now() - 86_400,
        }
    }
}

/// A zone with a KSK and a ZSK
pub struct TestZone {
    pub name: String,
    ksk: SigningKey,
    zsk: SigningKey,
}

impl TestZone {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ksk: SigningKey::generate(257),
            zsk: SigningKey::generate(256),
        }
    }

    pub fn ksk(&self) -> &DnsKey {
        &self.ksk.key
    }

    pub fn ds(&self) -> Ds {
        let mut data = name::to_wire(&self.name, true).unwrap();
        data.extend_from_slice(&self.ksk.key.to_rdata());
        Ds {
            key_tag: self.ksk.key.key_tag(),
            algorithm: 15,
            digest_type: 2,
            digest: DigestType::Sha256.digest(&data).unwrap(),
        }
    }

    pub fn ds_record(&self) -> DNSResource {
        DNSResource::new(&self.name, DNSResourceType::DS, TTL, self.ds().to_rdata())
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::ds(&self.name, self.ds())
    }

    fn rrsig_with(
        &self,
        key: &SigningKey,
        rrset: &[DNSResource],
        labels: u8,
        window: Window,
    ) -> DNSResource {
        let owner = rrset[0].name();
        let mut rrsig = Rrsig {
            type_covered: rrset[0].rtype,
            algorithm: 15,
            labels,
            original_ttl: TTL,
            expiration: window.expiration,
            inception: window.inception,
            key_tag: key.key.key_tag(),
            signer: self.name.clone(),
            signature: vec![0],
        };
        let refs: Vec<&DNSResource> = rrset.iter().collect();
        let data = rrsig.signed_data(&owner, &refs).unwrap();
        rrsig.signature = key.pair.sign(&data).as_ref().to_vec();
        DNSResource::new(&owner, DNSResourceType::RRSIG, TTL, rrsig.to_rdata().unwrap())
    }

    /// RRSIG over an RRset with the zone signing key
    pub fn sign(&self, rrset: &[DNSResource]) -> DNSResource {
        let labels = name::label_count(&rrset[0].name()) as u8;
        self.rrsig_with(&self.zsk, rrset, labels, Window::current())
    }

    pub fn sign_in_window(&self, rrset: &[DNSResource], window: Window) -> DNSResource {
        let labels = name::label_count(&rrset[0].name()) as u8;
        self.rrsig_with(&self.zsk, rrset, labels, window)
    }

    /// RRSIG as if the RRset were synthesized from `*.<encloser>`; the
    /// label count leaves out the `*`
    pub fn sign_wildcard(&self, rrset: &[DNSResource], encloser: &str) -> DNSResource {
        let labels = name::label_count(encloser) as u8;
        self.rrsig_with(&self.zsk, rrset, labels, Window::current())
    }

    /// RRset plus its signature
    pub fn signed(&self, rrset: Vec<DNSResource>) -> Vec<DNSResource> {
        let sig = self.sign(&rrset);
        let mut out = rrset;
        out.push(sig);
        out
    }

    pub fn dnskey_response(&self) -> DNSPacket {
        let keys = vec![
            DNSResource::new(&self.name, DNSResourceType::DNSKEY, TTL, self.ksk.key.to_rdata()),
            DNSResource::new(&self.name, DNSResourceType::DNSKEY, TTL, self.zsk.key.to_rdata()),
        ];
        let sig = self.rrsig_with(
            &self.ksk,
            &keys,
            name::label_count(&self.name) as u8,
            Window::current(),
        );
        let mut answers = keys;
        answers.push(sig);
        response(
            &self.name,
            DNSResourceType::DNSKEY,
            ResponseCode::NoError,
            answers,
            Vec::new(),
        )
    }

    /// Signed DS answer for a delegated child zone
    pub fn delegation_response(&self, child: &TestZone) -> DNSPacket {
        response(
            &child.name,
            DNSResourceType::DS,
            ResponseCode::NoError,
            self.signed(vec![child.ds_record()]),
            Vec::new(),
        )
    }

    /// Signed NODATA answer with a single NSEC at `qname`
    pub fn nodata_response(
        &self,
        qname: &str,
        qtype: DNSResourceType,
        next: &str,
        types: &[DNSResourceType],
    ) -> DNSPacket {
        response(
            qname,
            qtype,
            ResponseCode::NoError,
            Vec::new(),
            self.signed(vec![nsec(qname, next, types)]),
        )
    }
}

/// `.` → `com` → `example.com`, with the root anchored by DS
pub struct SignedTree {
    pub root: TestZone,
    pub com: TestZone,
    pub example: TestZone,
}

impl SignedTree {
    pub fn new() -> Self {
        Self {
            root: TestZone::new("."),
            com: TestZone::new("com"),
            example: TestZone::new("example.com"),
        }
    }

    pub fn anchors(&self) -> Arc<TrustAnchorStore> {
        let store = TrustAnchorStore::empty();
        store.add_anchor(self.root.anchor());
        Arc::new(store)
    }

    /// DNSKEY and DS answers down to the example.com zone
    pub fn script_chain(&self, transport: &MockTransport) {
        transport.respond(self.root.dnskey_response());
        transport.respond(self.root.delegation_response(&self.com));
        transport.respond(self.com.dnskey_response());
        transport.respond(self.com.delegation_response(&self.example));
        transport.respond(self.example.dnskey_response());
    }

    /// Signed TXT RRset at `owner` inside example.com, plus the DS denial
    /// the chain walk asks for at that name
    pub fn script_signed_txt(&self, transport: &MockTransport, owner: &str, texts: &[&str]) {
        let records: Vec<DNSResource> = texts.iter().map(|t| txt(owner, t)).collect();
        transport.respond(response(
            owner,
            DNSResourceType::TXT,
            ResponseCode::NoError,
            self.example.signed(records),
            Vec::new(),
        ));
        transport.respond(self.example.nodata_response(
            owner,
            DNSResourceType::DS,
            "zz.example.com",
            &[DNSResourceType::TXT, DNSResourceType::RRSIG, DNSResourceType::NSEC],
        ));
    }

    pub fn resolver(&self, transport: &Arc<MockTransport>) -> AliasResolver {
        let transport: Arc<dyn DnsTransport> = transport.clone();
        AliasResolver::new(transport, self.anchors(), fast_policy())
    }
}

pub const NON_UTF8_RECORD: &[u8] =
    b"oa1:xmr recipient_address=4A\xffB; recipient_name=A; tx_description=B;";

pub const PAY_RECORD: &str = "oa1:xmr recipient_address=46BeWrHpwXmHDpDEUmZBWZfoQpdc6HaERCNmx1pEYL2rAcuwufPN9rXHHtyUA4QVy66qeFQkn6sfK8aHYjA3jk3o1Bv16em; recipient_name=Monero Development; tx_description=Donation to Monero Core Team;";
