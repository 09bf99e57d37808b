// Static host identity (hostname, CPU, OS/arch) and LAN address detection via sysinfo.

use std::net::{IpAddr, Ipv4Addr};
use sysinfo::{Networks, System};

/// Interface name prefixes of VPN / tunnel devices; their addresses are never reported.
const VPN_PREFIXES: &[&str] = &[
    "tun",
    "tap",
    "utun",
    "wg",
    "tailscale",
    "nordlynx",
    "proton",
    "mullvad",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostInfo {
    pub hostname: String,
    pub cpu_model: String,
    pub cpu_family: String,
    pub cores: u32,
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    pub async fn detect() -> anyhow::Result<Self> {
        tokio::task::spawn_blocking(|| {
            let sys = System::new_all();
            let first = sys.cpus().first();
            let brand = first.map(|c| c.brand().trim().to_string()).unwrap_or_default();
            let vendor = first.map(|c| c.vendor_id().to_string()).unwrap_or_default();
            let cpu_model = read_cpu_model_linux()
                .or_else(|| Some(brand.clone()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| "Unknown".into());
            let cores = System::physical_core_count().unwrap_or(sys.cpus().len()) as u32;
            Self {
                hostname: System::host_name().unwrap_or_default(),
                cpu_family: cpu_family(&vendor, &cpu_model),
                cpu_model,
                cores,
                os: std::env::consts::OS.into(),
                arch: std::env::consts::ARCH.into(),
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))
    }
}

/// Coarse vendor family: "amd", "intel", "apple", else the lowercased vendor id.
pub(crate) fn cpu_family(vendor_id: &str, model: &str) -> String {
    let vendor = vendor_id.to_ascii_lowercase();
    let model = model.to_ascii_lowercase();
    if vendor.contains("amd") || model.starts_with("amd") {
        "amd".into()
    } else if vendor.contains("intel") || model.starts_with("intel") {
        "intel".into()
    } else if vendor.contains("apple") || model.starts_with("apple") {
        "apple".into()
    } else if vendor.is_empty() {
        "unknown".into()
    } else {
        vendor
    }
}

/// Read first "model name" from /proc/cpuinfo (Linux).
fn read_cpu_model_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty())?;
                return Some(name.to_string());
            }
        }
    }
    None
}

fn is_vpn_interface(name: &str) -> bool {
    VPN_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_private()
}

/// Pick the address to report: skip VPN interfaces and loopback, prefer RFC 1918 over any
/// other IPv4.
pub(crate) fn choose_lan_ip<'a>(
    addrs: impl IntoIterator<Item = (&'a str, IpAddr)>,
) -> Option<Ipv4Addr> {
    let mut fallback = None;
    for (name, addr) in addrs {
        let IpAddr::V4(ip) = addr else { continue };
        if ip.is_loopback() || ip.is_unspecified() || is_vpn_interface(name) {
            continue;
        }
        if is_private_ipv4(ip) {
            return Some(ip);
        }
        fallback.get_or_insert(ip);
    }
    fallback
}

/// Worker ids are the host IP with dashes ("192-168-1-50").
pub(crate) fn ip_from_worker_id(worker_id: &str) -> Option<Ipv4Addr> {
    worker_id.replace('-', ".").parse().ok()
}

pub async fn detect_lan_ip() -> Option<Ipv4Addr> {
    tokio::task::spawn_blocking(|| {
        let networks = Networks::new_with_refreshed_list();
        let mut addrs: Vec<(&str, IpAddr)> = networks
            .list()
            .iter()
            .flat_map(|(name, data)| data.ip_networks().iter().map(move |n| (name.as_str(), n.addr)))
            .collect();
        addrs.sort_by(|a, b| a.0.cmp(b.0));
        choose_lan_ip(addrs)
    })
    .await
    .ok()
    .flatten()
}
