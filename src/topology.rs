/// Memory nodes of this machine and the CPUs local to each.
///
/// Read from `/sys/devices/system/node` on Linux. Machines without that
/// hierarchy (or non-Linux targets) are modelled as one node owning every CPU.
/// Logical node ids beyond the physical count wrap around, so callers may
/// request more nodes than exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    cpus: Vec<Vec<usize>>,
}

impl Topology {
    const SYSFS: &'static str = "/sys/devices/system/node";

    pub fn detect() -> Self {
        Self::from_sysfs().unwrap_or_else(Self::flat)
    }

    /// Single node holding every CPU.
    pub fn flat() -> Self {
        Self {
            cpus: vec![(0..num_cpus::get()).collect()],
        }
    }

    /// Number of physical nodes.
    pub fn nodes(&self) -> usize {
        self.cpus.len()
    }

    /// CPUs local to a logical node.
    pub fn cpus(&self, node: usize) -> &[usize] {
        &self.cpus[node % self.cpus.len()]
    }

    /// Restricts the calling thread to the CPUs of `node`.
    ///
    /// Pages first touched afterwards are placed on that node by the kernel's
    /// default policy, which is how worker slabs end up node-local.
    #[cfg(target_os = "linux")]
    pub fn bind(&self, node: usize) -> std::io::Result<()> {
        let cpus = self.cpus(node);
        unsafe {
            let mut set = std::mem::zeroed::<libc::cpu_set_t>();
            libc::CPU_ZERO(&mut set);
            cpus.iter().for_each(|&cpu| libc::CPU_SET(cpu, &mut set));
            match libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) {
                0 => Ok(()),
                _ => Err(std::io::Error::last_os_error()),
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn bind(&self, _: usize) -> std::io::Result<()> {
        Ok(())
    }

    fn from_sysfs() -> Option<Self> {
        let mut nodes = std::fs::read_dir(Self::SYSFS)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()?
                    .strip_prefix("node")?
                    .parse::<usize>()
                    .ok()
                    .map(|id| (id, entry.path()))
            })
            .filter_map(|(id, path)| {
                std::fs::read_to_string(path.join("cpulist"))
                    .ok()
                    .map(|list| (id, Self::parse(&list)))
            })
            .filter(|(_, cpus)| !cpus.is_empty())
            .collect::<Vec<_>>();
        nodes.sort_by_key(|(id, _)| *id);
        match nodes.is_empty() {
            true => None,
            false => Some(Self {
                cpus: nodes.into_iter().map(|(_, cpus)| cpus).collect(),
            }),
        }
    }

    /// Parses kernel cpulist syntax such as `0-3,8,10-11`.
    fn parse(list: &str) -> Vec<usize> {
        list.trim()
            .split(',')
            .filter(|s| !s.is_empty())
            .flat_map(|range| match range.split_once('-') {
                Some((lo, hi)) => match (lo.parse::<usize>(), hi.parse::<usize>()) {
                    (Ok(lo), Ok(hi)) => (lo..=hi).collect::<Vec<_>>(),
                    _ => vec![],
                },
                None => range.parse::<usize>().into_iter().collect(),
            })
            .collect()
    }
}

impl From<Vec<Vec<usize>>> for Topology {
    fn from(cpus: Vec<Vec<usize>>) -> Self {
        assert!(!cpus.is_empty(), "topology needs at least one node");
        Self { cpus }
    }
}
