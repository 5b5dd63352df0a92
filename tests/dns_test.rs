//! Resolver Tests
//!
//! Covers:
//! - Special-name bypass to the native resolver
//! - Type/protocol backfill of `getaddrinfo` results
//! - Stale-channel retry after a fork
//! - `getnameinfo` candidate checks, port clamping and service conventions
//! - Reverse lookup fallback through `getaddrinfo`
//! - `close()` semantics
//!
//! The engine is a scripted mock: each operation pops the next reply from a
//! queue, and a held reply keeps the completion until the channel is
//! destroyed.

use hubdns::base::neterror::{ErrorKind, NetError, EAI_AGAIN, EAI_NONAME};
use hubdns::dns::types::{AI_NUMERICHOST, IPPROTO_TCP, IPPROTO_UDP};
use hubdns::dns::{
    AddrInfo, AddrInfoHints, AddrInfoQuery, AddressFamily, Channel, ChannelFactory, ChannelParams,
    EngineAddrInfo, EngineError, EngineNameInfo, HostEnt, NameInfoAddr, NativeResolver, PortArg,
    Resolver, ServiceConvention, SockType,
};
use hubdns::hub::waiter::Completion;
use hubdns::hub::{Hub, PidSource};

use std::any::Any;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Reply<T> {
    Ok(T),
    Err(EngineError),
    /// Fails the call synchronously.
    Reject(EngineError),
    /// Never answers; the completion is dropped when the channel is destroyed.
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    HostByName { channel: usize, name: String },
    AddrInfo { channel: usize, query: AddrInfoQuery },
    HostByAddr { channel: usize, addr: String },
    NameInfo { channel: usize, addr: SocketAddr, flags: i32 },
}

impl Call {
    fn channel(&self) -> usize {
        match self {
            Call::HostByName { channel, .. }
            | Call::AddrInfo { channel, .. }
            | Call::HostByAddr { channel, .. }
            | Call::NameInfo { channel, .. } => *channel,
        }
    }
}

#[derive(Default)]
struct Script {
    host_by_name: Mutex<VecDeque<Reply<HostEnt>>>,
    addr_info: Mutex<VecDeque<Reply<Vec<EngineAddrInfo>>>>,
    host_by_addr: Mutex<VecDeque<Reply<HostEnt>>>,
    name_info: Mutex<VecDeque<Reply<EngineNameInfo>>>,
    calls: Mutex<Vec<Call>>,
    held: AtomicUsize,
    channels: Mutex<Vec<Arc<ScriptedChannel>>>,
}

impl Script {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn channels(&self) -> Vec<Arc<ScriptedChannel>> {
        self.channels.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
struct ScriptedChannel {
    index: usize,
    held: Mutex<Vec<Box<dyn Any + Send>>>,
    destroyed: AtomicUsize,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script").finish_non_exhaustive()
    }
}

/// A channel bound to a shared script.
#[derive(Debug)]
struct Engine {
    channel: Arc<ScriptedChannel>,
    script: Arc<Script>,
}

impl Engine {
    fn answer<T: Send + 'static>(
        &self,
        queue: &Mutex<VecDeque<Reply<T>>>,
        done: Completion<T>,
    ) -> Result<(), EngineError> {
        if self.channel.destroyed.load(Ordering::SeqCst) > 0 {
            return Err(EngineError::Destruction);
        }
        match queue.lock().unwrap().pop_front() {
            Some(Reply::Ok(value)) => done.switch(value),
            Some(Reply::Err(err)) => done.throw(err),
            Some(Reply::Reject(err)) => return Err(err),
            Some(Reply::Hold) => {
                self.channel.held.lock().unwrap().push(Box::new(done));
                self.script.held.fetch_add(1, Ordering::SeqCst);
            }
            None => panic!("unscripted engine call on channel {}", self.channel.index),
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.script.calls.lock().unwrap().push(call);
    }
}

impl Channel for Engine {
    fn gethostbyname(
        &self,
        done: Completion<HostEnt>,
        name: &[u8],
        _family: AddressFamily,
    ) -> Result<(), EngineError> {
        self.record(Call::HostByName {
            channel: self.channel.index,
            name: String::from_utf8_lossy(name).into_owned(),
        });
        self.answer(&self.script.host_by_name, done)
    }

    fn getaddrinfo(
        &self,
        done: Completion<Vec<EngineAddrInfo>>,
        query: AddrInfoQuery,
    ) -> Result<(), EngineError> {
        self.record(Call::AddrInfo { channel: self.channel.index, query });
        self.answer(&self.script.addr_info, done)
    }

    fn gethostbyaddr(&self, done: Completion<HostEnt>, addr: &[u8]) -> Result<(), EngineError> {
        self.record(Call::HostByAddr {
            channel: self.channel.index,
            addr: String::from_utf8_lossy(addr).into_owned(),
        });
        self.answer(&self.script.host_by_addr, done)
    }

    fn getnameinfo(
        &self,
        done: Completion<EngineNameInfo>,
        addr: SocketAddr,
        flags: i32,
    ) -> Result<(), EngineError> {
        self.record(Call::NameInfo { channel: self.channel.index, addr, flags });
        self.answer(&self.script.name_info, done)
    }

    fn destroy(&self) {
        self.channel.destroyed.fetch_add(1, Ordering::SeqCst);
        self.channel.held.lock().unwrap().clear();
    }
}

struct ScriptedFactory(Arc<Script>);

impl ChannelFactory for ScriptedFactory {
    fn create(&self, _hub: &Hub, _params: &ChannelParams) -> Result<Arc<dyn Channel>, NetError> {
        let mut channels = self.0.channels.lock().unwrap();
        let channel = Arc::new(ScriptedChannel { index: channels.len(), ..Default::default() });
        channels.push(Arc::clone(&channel));
        Ok(Arc::new(Engine { channel, script: Arc::clone(&self.0) }))
    }
}

/// Native resolver answering every query with a fixed record list.
#[derive(Clone, Default)]
struct MockNative {
    records: Arc<Mutex<Vec<AddrInfo>>>,
    calls: Arc<Mutex<Vec<(Option<Vec<u8>>, PortArg, AddrInfoHints)>>>,
    hostent_calls: Arc<AtomicUsize>,
}

impl NativeResolver for MockNative {
    fn getaddrinfo(
        &self,
        host: Option<&[u8]>,
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError> {
        self.calls.lock().unwrap().push((host.map(<[u8]>::to_vec), port.clone(), *hints));
        Ok(self.records.lock().unwrap().clone())
    }

    fn gethostbyname_ex(&self, host: &[u8]) -> Result<HostEnt, NetError> {
        self.hostent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(HostEnt {
            name: String::from_utf8_lossy(host).into_owned(),
            aliases: vec![],
            addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        })
    }
}

struct Fixture {
    hub: Hub,
    pid: Arc<AtomicU32>,
    script: Arc<Script>,
    native: MockNative,
    resolver: Resolver,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture_with(convention: ServiceConvention) -> Fixture {
    init_tracing();
    let pid = Arc::new(AtomicU32::new(1));
    let shared = Arc::clone(&pid);
    let source: PidSource = Arc::new(move || shared.load(Ordering::SeqCst));
    let hub = Hub::with_pid_source(source);
    let script = Arc::new(Script::default());
    let native = MockNative::default();

    let resolver = Resolver::builder(hub.clone())
        .use_environ(false)
        .factory(ScriptedFactory(Arc::clone(&script)))
        .native(native.clone())
        .service_convention(convention)
        .build()
        .unwrap();

    Fixture { hub, pid, script, native, resolver }
}

fn fixture() -> Fixture {
    fixture_with(ServiceConvention::Modern)
}

impl Fixture {
    /// Simulates a fork once the engine holds a query.
    async fn fork_when_held(&self) {
        while self.script.held.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        self.pid.fetch_add(1, Ordering::SeqCst);
        assert!(self.hub.reinit());
    }
}

fn record(addr: &str) -> EngineAddrInfo {
    let sockaddr: SocketAddr = addr.parse().unwrap();
    EngineAddrInfo {
        family: AddressFamily::of(&sockaddr.ip()),
        socktype: None,
        protocol: None,
        canonname: "example.com".to_string(),
        sockaddr,
    }
}

fn hostent(name: &str, ip: &str) -> HostEnt {
    HostEnt { name: name.to_string(), aliases: vec![], addresses: vec![ip.parse().unwrap()] }
}

fn native_record(ip: &str, port: u16) -> AddrInfo {
    let ip: IpAddr = ip.parse().unwrap();
    AddrInfo {
        family: AddressFamily::of(&ip),
        socktype: SockType::Stream,
        protocol: IPPROTO_TCP,
        canonname: String::new(),
        sockaddr: SocketAddr::new(ip, port),
    }
}

// ---------------------------------------------------------------------------
// Special-name bypass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_special_names_use_native_resolver() {
    let fx = fixture();
    *fx.native.records.lock().unwrap() = vec![native_record("127.0.0.1", 80)];

    let hints = AddrInfoHints::new().socktype(SockType::Stream);
    let ours = fx.resolver.getaddrinfo("localhost", 80, hints).await.unwrap();
    let native = fx.native.getaddrinfo(Some(&b"localhost"[..]), &PortArg::Int(80), &hints).unwrap();
    assert_eq!(ours, native);

    fx.resolver.getaddrinfo("ip6-localhost", 80, hints).await.unwrap();
    fx.resolver
        .getaddrinfo("192.0.2.7", 80, AddrInfoHints::new().flags(AI_NUMERICHOST))
        .await
        .unwrap();
    fx.resolver.getaddrinfo(None::<&str>, 80, hints).await.unwrap();

    for name in ["localhost", "ip6-localhost", "255.255.255.255", "<broadcast>"] {
        let hostent = fx.resolver.gethostbyname_ex(name, AddressFamily::Inet).await.unwrap();
        assert_eq!(hostent.name, name);
    }

    assert_eq!(fx.native.hostent_calls.load(Ordering::SeqCst), 4);
    assert!(fx.script.calls().is_empty());
}

#[tokio::test]
async fn test_special_names_are_case_sensitive() {
    let fx = fixture();
    fx.script.host_by_name.lock().unwrap().push_back(Reply::Ok(hostent("LOCALHOST", "10.0.0.1")));

    fx.resolver.gethostbyname_ex("LOCALHOST", AddressFamily::Inet).await.unwrap();
    assert_eq!(fx.native.hostent_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.script.calls().len(), 1);
}

#[tokio::test]
async fn test_broadcast_is_not_special_for_getaddrinfo() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("255.255.255.255:0")]));

    fx.resolver.getaddrinfo("<broadcast>", 0, AddrInfoHints::new()).await.unwrap();
    assert!(fx.native.calls.lock().unwrap().is_empty());
    assert_eq!(fx.script.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Backfill
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_getaddrinfo_expands_untyped_records() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("93.184.216.34:443")]));

    let out = fx.resolver.getaddrinfo("example.com", 443, AddrInfoHints::new()).await.unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!((out[0].socktype, out[0].protocol), (SockType::Stream, IPPROTO_TCP));
    assert_eq!((out[1].socktype, out[1].protocol), (SockType::Dgram, IPPROTO_UDP));
    for info in &out {
        assert_eq!(info.family, AddressFamily::Inet);
        assert_eq!(info.canonname, "example.com");
        assert_eq!(info.sockaddr, "93.184.216.34:443".parse::<SocketAddr>().unwrap());
    }
}

#[tokio::test]
async fn test_getaddrinfo_honors_requested_socktype() {
    let fx = fixture();
    fx.script
        .addr_info
        .lock()
        .unwrap()
        .push_back(Reply::Ok(vec![record("93.184.216.34:53"), record("[2001:db8::1]:53")]));

    let hints = AddrInfoHints::new().socktype(SockType::Dgram);
    let out = fx.resolver.getaddrinfo("example.com", "53", hints).await.unwrap();

    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| (r.socktype, r.protocol) == (SockType::Dgram, IPPROTO_UDP)));
}

#[tokio::test]
async fn test_getaddrinfo_query_shape() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.1:0")]));

    let hints = AddrInfoHints::new().family(AddressFamily::Inet6).protocol(IPPROTO_TCP);
    fx.resolver.getaddrinfo("bücher.example", 0, hints).await.unwrap();

    match &fx.script.calls()[0] {
        Call::AddrInfo { query, .. } => {
            assert_eq!(query.host, b"xn--bcher-kva.example".to_vec());
            assert_eq!(query.service, None);
            assert_eq!(query.family, AddressFamily::Inet6);
            assert_eq!(query.protocol, IPPROTO_TCP);
        }
        other => panic!("Expected getaddrinfo, got {:?}", other),
    }
}

#[tokio::test]
async fn test_getaddrinfo_empty_answer() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![]));

    let err = fx.resolver.getaddrinfo("example.com", 80, AddrInfoHints::new()).await.unwrap_err();
    assert_eq!(err, NetError::name_not_known());
    assert_eq!(err.code(), Some(EAI_NONAME));
}

// ---------------------------------------------------------------------------
// Stale-channel retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fork_retries_getaddrinfo_once() {
    let fx = fixture();
    {
        let mut queue = fx.script.addr_info.lock().unwrap();
        queue.push_back(Reply::Hold);
        queue.push_back(Reply::Ok(vec![record("10.0.0.2:80")]));
    }

    let (result, ()) = tokio::join!(
        fx.resolver.getaddrinfo("example.com", 80, AddrInfoHints::new().socktype(SockType::Stream)),
        fx.fork_when_held()
    );

    let out = result.unwrap();
    assert_eq!(out[0].sockaddr, "10.0.0.2:80".parse::<SocketAddr>().unwrap());

    let calls = fx.script.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].channel(), 0);
    assert_eq!(calls[1].channel(), 1);

    let channels = fx.script.channels();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(channels[1].destroyed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fork_retries_gethostbyname_ex_once() {
    let fx = fixture();
    {
        let mut queue = fx.script.host_by_name.lock().unwrap();
        queue.push_back(Reply::Hold);
        queue.push_back(Reply::Ok(hostent("example.com", "10.0.0.3")));
    }

    let (result, ()) = tokio::join!(
        fx.resolver.gethostbyname("example.com", AddressFamily::Inet),
        fx.fork_when_held()
    );

    assert_eq!(result.unwrap(), "10.0.0.3".parse::<IpAddr>().unwrap());
    let channels: Vec<usize> = fx.script.calls().iter().map(Call::channel).collect();
    assert_eq!(channels, vec![0, 1]);
}

#[tokio::test]
async fn test_fork_retries_gethostbyaddr_once() {
    let fx = fixture();
    {
        let mut queue = fx.script.host_by_addr.lock().unwrap();
        queue.push_back(Reply::Hold);
        queue.push_back(Reply::Ok(hostent("host.example", "10.0.0.4")));
    }

    let (result, ()) =
        tokio::join!(fx.resolver.gethostbyaddr("10.0.0.4"), fx.fork_when_held());

    assert_eq!(result.unwrap().name, "host.example");
    let channels: Vec<usize> = fx.script.calls().iter().map(Call::channel).collect();
    assert_eq!(channels, vec![0, 1]);
}

#[tokio::test]
async fn test_fork_retries_getnameinfo_once() {
    let fx = fixture();
    {
        let mut queue = fx.script.addr_info.lock().unwrap();
        queue.push_back(Reply::Ok(vec![record("10.0.0.5:80")]));
        queue.push_back(Reply::Ok(vec![record("10.0.0.5:80")]));
    }
    {
        let mut queue = fx.script.name_info.lock().unwrap();
        queue.push_back(Reply::Hold);
        queue.push_back(Reply::Ok(EngineNameInfo {
            node: "host.example".to_string(),
            service: Some("http".to_string()),
        }));
    }

    let (result, ()) = tokio::join!(
        fx.resolver.getnameinfo(NameInfoAddr::new("host.example", 80), 0),
        fx.fork_when_held()
    );

    let info = result.unwrap();
    assert_eq!((info.node.as_str(), info.service.as_str()), ("host.example", "http"));

    let name_info_channels: Vec<usize> = fx
        .script
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::NameInfo { .. }))
        .map(Call::channel)
        .collect();
    assert_eq!(name_info_channels, vec![0, 1]);
}

#[tokio::test]
async fn test_fork_retry_failure_is_surfaced() {
    let fx = fixture();
    {
        let mut queue = fx.script.addr_info.lock().unwrap();
        queue.push_back(Reply::Hold);
        queue.push_back(Reply::Err(EngineError::Timeout));
    }

    let (result, ()) = tokio::join!(
        fx.resolver.getaddrinfo("example.com", 80, AddrInfoHints::new()),
        fx.fork_when_held()
    );

    let err = result.unwrap_err();
    assert!(err.is_addr_info());
    assert_eq!(err.code(), Some(EAI_AGAIN));

    let channels: Vec<usize> = fx.script.calls().iter().map(Call::channel).collect();
    assert_eq!(channels, vec![0, 1]);
}

#[tokio::test]
async fn test_stale_success_is_returned() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Hold);

    // The old channel answers after the fork has replaced it.
    let answer_late = async {
        while fx.script.held.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        let held = fx.script.channels()[0].held.lock().unwrap().pop().unwrap();
        let done = *held.downcast::<Completion<Vec<EngineAddrInfo>>>().unwrap();

        fx.pid.fetch_add(1, Ordering::SeqCst);
        assert!(fx.hub.reinit());
        fx.hub.flush().await;
        done.switch(vec![record("10.9.9.9:80")]);
    };

    let (result, ()) = tokio::join!(
        fx.resolver.getaddrinfo("example.com", 80, AddrInfoHints::new().socktype(SockType::Stream)),
        answer_late
    );

    let out = result.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sockaddr, "10.9.9.9:80".parse::<SocketAddr>().unwrap());
    assert_eq!(fx.script.calls().len(), 1);
    assert_eq!(fx.script.channels().len(), 2);
}

#[tokio::test]
async fn test_live_channel_errors_are_not_retried() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Err(EngineError::Timeout));

    let err = fx.resolver.getaddrinfo("example.com", 80, AddrInfoHints::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AddrInfo);
    assert_eq!(fx.script.calls().len(), 1);
}

#[tokio::test]
async fn test_close_while_waiting_reports_closed() {
    let fx = fixture();
    fx.script.host_by_addr.lock().unwrap().push_back(Reply::Hold);

    let close = async {
        while fx.script.held.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        fx.resolver.close();
    };
    let (result, ()) = tokio::join!(fx.resolver.gethostbyaddr("10.0.0.6"), close);

    assert_eq!(result.unwrap_err(), NetError::Closed);
    assert_eq!(fx.script.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// getnameinfo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_getnameinfo_requires_single_candidate() {
    let fx = fixture();
    {
        let mut queue = fx.script.addr_info.lock().unwrap();
        queue.push_back(Reply::Ok(vec![record("10.0.0.7:80"), record("10.0.0.8:80")]));
        queue.push_back(Reply::Ok(vec![]));
    }

    let err = fx.resolver.getnameinfo(NameInfoAddr::new("multi.example", 80), 0).await.unwrap_err();
    assert_eq!(err, NetError::Os("sockaddr resolved to multiple addresses".to_string()));

    let err = fx.resolver.getnameinfo(NameInfoAddr::new("none.example", 80), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Os);

    assert!(!fx.script.calls().iter().any(|call| matches!(call, Call::NameInfo { .. })));
}

#[tokio::test]
async fn test_getnameinfo_clamps_large_port() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.9:0")]));
    fx.script.name_info.lock().unwrap().push_back(Reply::Ok(EngineNameInfo {
        node: "host.example".to_string(),
        service: Some("0".to_string()),
    }));

    let info = fx.resolver.getnameinfo(NameInfoAddr::new("host.example", 70000), 0).await.unwrap();
    assert_eq!(info.node, "host.example");

    match &fx.script.calls()[0] {
        Call::AddrInfo { query, .. } => {
            assert_eq!(query.service, None);
            assert_eq!(query.socktype, Some(SockType::Dgram));
        }
        other => panic!("Expected getaddrinfo, got {:?}", other),
    }
}

#[tokio::test]
async fn test_getnameinfo_ipv6_takes_caller_flow() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("[2001:db8::1]:443")]));
    fx.script.name_info.lock().unwrap().push_back(Reply::Ok(EngineNameInfo {
        node: "v6.example".to_string(),
        service: Some("https".to_string()),
    }));

    fx.resolver.getnameinfo(NameInfoAddr::v6("v6.example", 443, 7, 2), 0).await.unwrap();

    let addr = fx
        .script
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::NameInfo { addr: SocketAddr::V6(addr), .. } => Some(addr),
            _ => None,
        })
        .unwrap();
    assert_eq!((addr.port(), addr.flowinfo(), addr.scope_id()), (443, 7, 2));
}

#[tokio::test]
async fn test_getnameinfo_ipv4_arity() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.10:80")]));

    let addr = NameInfoAddr::new("host.example", 80).with_flowinfo(0);
    let err = fx.resolver.getnameinfo(addr, 0).await.unwrap_err();
    assert_eq!(err, NetError::Os("IPv4 sockaddr must be 2 tuple".to_string()));
}

#[tokio::test]
async fn test_getnameinfo_missing_service_modern() {
    let fx = fixture();
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.11:0")]));
    fx.script
        .name_info
        .lock()
        .unwrap()
        .push_back(Reply::Ok(EngineNameInfo { node: "host.example".to_string(), service: None }));

    let err = fx.resolver.getnameinfo(NameInfoAddr::new("host.example", 0), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AddrInfo);
    assert_eq!(err.code(), Some(EAI_NONAME));
}

#[tokio::test]
async fn test_getnameinfo_missing_service_historical() {
    let fx = fixture_with(ServiceConvention::Historical);
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.12:0")]));
    fx.script
        .name_info
        .lock()
        .unwrap()
        .push_back(Reply::Ok(EngineNameInfo { node: "host.example".to_string(), service: None }));

    let info = fx.resolver.getnameinfo(NameInfoAddr::new("host.example", 0), 0).await.unwrap();
    assert_eq!(info.node, "host.example");
    assert_eq!(info.service, "0");
}

#[tokio::test]
async fn test_getnameinfo_input_errors() {
    let fx = fixture();

    let err = fx
        .resolver
        .getnameinfo(NameInfoAddr::new("::1", 80).with_flowinfo(0x100000), 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);

    let err = fx.resolver.getnameinfo(NameInfoAddr::new(None::<&str>, 80), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    assert!(fx.script.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Forward and reverse lookups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_host_is_addr_info_error() {
    let fx = fixture();
    fx.script.host_by_name.lock().unwrap().push_back(Reply::Err(EngineError::NotFound));

    let err = fx.resolver.gethostbyname_ex("nx.example", AddressFamily::Inet).await.unwrap_err();
    assert_eq!(err, NetError::name_not_known());
}

#[tokio::test]
async fn test_other_host_errors_pass_through() {
    let fx = fixture();
    fx.script.host_by_name.lock().unwrap().push_back(Reply::Err(EngineError::Timeout));

    let err = fx.resolver.gethostbyname_ex("slow.example", AddressFamily::Inet).await.unwrap_err();
    assert_eq!(err, NetError::host(2));
}

#[tokio::test]
async fn test_reverse_lookup_falls_back_to_resolved_address() {
    let fx = fixture();
    {
        let mut queue = fx.script.host_by_addr.lock().unwrap();
        queue.push_back(Reply::Reject(EngineError::InvalidIp("www.example".to_string())));
        queue.push_back(Reply::Ok(hostent("www.example", "93.184.216.34")));
    }
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("93.184.216.34:0")]));

    let hostent = fx.resolver.gethostbyaddr("www.example").await.unwrap();
    assert_eq!(hostent.name, "www.example");

    let addrs: Vec<String> = fx
        .script
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::HostByAddr { addr, .. } => Some(addr),
            _ => None,
        })
        .collect();
    assert_eq!(addrs, vec!["www.example".to_string(), "93.184.216.34".to_string()]);
}

#[tokio::test]
async fn test_reverse_lookup_fallback_to_same_address_fails() {
    let fx = fixture();
    fx.script
        .host_by_addr
        .lock()
        .unwrap()
        .push_back(Reply::Reject(EngineError::InvalidIp("10.0.0.13".to_string())));
    fx.script.addr_info.lock().unwrap().push_back(Reply::Ok(vec![record("10.0.0.13:0")]));

    let err = fx.resolver.gethostbyaddr("10.0.0.13").await.unwrap_err();
    assert_eq!(err, NetError::InvalidIp("10.0.0.13".to_string()));
}

#[tokio::test]
async fn test_empty_hostname_is_wildcard() {
    let fx = fixture();
    *fx.native.records.lock().unwrap() = vec![native_record("0.0.0.0", 0)];
    fx.script.host_by_name.lock().unwrap().push_back(Reply::Ok(hostent("0.0.0.0", "0.0.0.0")));

    let ip = fx.resolver.gethostbyname("", AddressFamily::Inet).await.unwrap();
    assert_eq!(ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let (host, _port, hints) = fx.native.calls.lock().unwrap()[0].clone();
    assert_eq!(host, None);
    assert_eq!(hints.socktype, Some(SockType::Dgram));
    assert_eq!(fx.script.calls()[0], Call::HostByName { channel: 0, name: "0.0.0.0".to_string() });
}

#[tokio::test]
async fn test_ambiguous_wildcard() {
    let fx = fixture();
    *fx.native.records.lock().unwrap() = vec![native_record("0.0.0.0", 0), native_record("::", 0)];

    let err = fx.resolver.gethostbyaddr(b"").await.unwrap_err();
    assert_eq!(err, NetError::Os("wildcard resolved to multiple address".to_string()));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_close_is_idempotent() {
    let fx = fixture();
    fx.resolver.close();
    fx.resolver.close();
    fx.hub.flush().await;

    let channels = fx.script.channels();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].destroyed.load(Ordering::SeqCst), 1);

    let err = fx.resolver.gethostbyname("example.com", AddressFamily::Inet).await.unwrap_err();
    assert_eq!(err, NetError::Closed);
    let err = fx.resolver.getnameinfo(NameInfoAddr::new("host.example", 80), 0).await.unwrap_err();
    assert_eq!(err, NetError::Closed);
}

#[tokio::test]
async fn test_params_snapshot_survives_fork() {
    let fx = fixture();
    fx.pid.store(42, Ordering::SeqCst);
    fx.hub.reinit();
    fx.hub.flush().await;

    assert_eq!(fx.script.channels().len(), 2);
    assert_eq!(fx.resolver.params(), &ChannelParams::default());
}
