//! NetworkManager command-line wrapper
//!
//! Everything here goes through `nmcli -t` (terse mode): one record per
//! line, fields separated by `:`, with literal `:` and `\` escaped by a
//! backslash.

use crate::command;
use crate::error::NetplanResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One row of `nmcli device status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub connection: String,
    pub state: String,
}

impl DeviceStatus {
    pub fn is_wifi(&self) -> bool {
        self.device_type == "wifi"
    }

    pub fn is_connected(&self) -> bool {
        self.state == "connected"
    }
}

#[derive(Default)]
pub struct NmcliController;

impl NmcliController {
    pub fn new() -> Self {
        Self
    }

    /// Visible SSIDs, sorted, without duplicates or hidden networks
    pub async fn wifi_ssids(&self) -> NetplanResult<Vec<String>> {
        let output = command::run("nmcli", &["-t", "-f", "SSID", "device", "wifi", "list"]).await?;
        Ok(parse_ssids(&output))
    }

    pub async fn device_status(&self) -> NetplanResult<Vec<DeviceStatus>> {
        let output = command::run(
            "nmcli",
            &["-t", "-f", "DEVICE,TYPE,CONNECTION,STATE", "device", "status"],
        )
        .await?;
        Ok(parse_device_status(&output))
    }

    /// Disconnect the first connected Wi-Fi device. Returns whether one was found.
    pub async fn disconnect_wifi(&self) -> NetplanResult<bool> {
        let devices = self.device_status().await?;
        match devices.iter().find(|d| d.is_wifi() && d.is_connected()) {
            Some(device) => {
                command::run("nmcli", &["device", "disconnect", &device.device]).await?;
                info!("Disconnected {} from '{}'", device.device, device.connection);
                Ok(true)
            }
            None => {
                debug!("No connected Wi-Fi device to disconnect");
                Ok(false)
            }
        }
    }
}

/// Split one terse-mode line into its fields
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    field.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

pub fn parse_ssids(output: &str) -> Vec<String> {
    let mut ssids: Vec<String> = output
        .lines()
        .filter_map(|line| split_terse(line).into_iter().next())
        .map(|ssid| ssid.trim().to_string())
        .filter(|ssid| !ssid.is_empty())
        .collect();
    ssids.sort();
    ssids.dedup();
    ssids
}

pub fn parse_device_status(output: &str) -> Vec<DeviceStatus> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            if fields.len() < 4 {
                warn!("Unexpected nmcli device line: {}", line);
                return None;
            }
            let mut fields = fields.into_iter();
            Some(DeviceStatus {
                device: fields.next()?,
                device_type: fields.next()?,
                connection: fields.next()?,
                state: fields.next()?,
            })
        })
        .collect()
}

/// `IN-USE,SSID` output: the active network is marked with `*`
pub fn parse_in_use(output: &str) -> bool {
    output
        .lines()
        .any(|line| split_terse(line).first().is_some_and(|f| f.trim() == "*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terse_unescapes() {
        assert_eq!(split_terse("a:b:c"), vec!["a", "b", "c"]);
        assert_eq!(split_terse(r"Cafe\:Guest:wifi"), vec!["Cafe:Guest", "wifi"]);
        assert_eq!(split_terse(r"back\\slash"), vec![r"back\slash"]);
        assert_eq!(split_terse("wlan0::disconnected"), vec!["wlan0", "", "disconnected"]);
    }

    #[test]
    fn test_parse_ssids() {
        let output = "home\n\nguest\nhome\n  \nCafe\\:Guest\n";
        assert_eq!(parse_ssids(output), vec!["Cafe:Guest", "guest", "home"]);
    }

    #[test]
    fn test_parse_device_status() {
        let output = "eth0:ethernet:Wired connection 1:connected\n\
                      wlan0:wifi:home:connected\n\
                      lo:loopback::unmanaged\n\
                      garbage\n";
        let devices = parse_device_status(output);
        assert_eq!(devices.len(), 3);
        assert!(devices[1].is_wifi());
        assert!(devices[1].is_connected());
        assert_eq!(devices[1].connection, "home");
        assert_eq!(devices[2].connection, "");
        assert!(!devices[2].is_connected());
    }

    #[test]
    fn test_parse_in_use() {
        assert!(parse_in_use(" :neighbour\n*:home\n"));
        assert!(!parse_in_use(" :neighbour\n :home\n"));
        assert!(!parse_in_use(""));
    }
}
