//! 静态路由表
//!
//! 每个节点一张表，目的子网 -> 下一跳地址。表内目的子网两两不重叠。

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::net::overlaps;

/// 一条静态路由
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    pub dest: Ipv4Net,
    pub via: Ipv4Addr,
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.dest, self.via)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: BTreeMap<Ipv4Net, Ipv4Addr>,
}

impl RouteTable {
    /// 插入一条路由：成功返回 Ok；与已有目的子网重叠则返回 Err(已有子网)
    pub fn insert(&mut self, entry: RouteEntry) -> Result<(), Ipv4Net> {
        if let Some(existing) = self.entries.keys().find(|k| overlaps(k, &entry.dest)) {
            return Err(*existing);
        }
        self.entries.insert(entry.dest, entry.via);
        Ok(())
    }

    pub fn get(&self, dest: &Ipv4Net) -> Option<Ipv4Addr> {
        self.entries.get(dest).copied()
    }

    /// 按目的子网排序的全部路由
    pub fn entries(&self) -> impl Iterator<Item = RouteEntry> + '_ {
        self.entries
            .iter()
            .map(|(&dest, &via)| RouteEntry { dest, via })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最长前缀匹配
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<RouteEntry> {
        self.entries()
            .filter(|e| e.dest.contains(&dst))
            .max_by_key(|e| e.dest.prefix_len())
    }
}
