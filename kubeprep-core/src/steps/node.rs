use std::path::Path;

use log::{debug, info};

use crate::{
    context::RunContext,
    error::StepError,
    host::{Host, Invocation},
    os_release::{OsRelease, OS_RELEASE_PATH},
    templates::{self, APT_KEYRINGS_DIR, KUBERNETES_APT_KEYRING_PATH},
};

use super::best_effort;

pub const OS_EXPECTED_ID: &str = "ubuntu";
pub const OS_EXPECTED_VERSION: &str = "22.04";

pub const CONFLICTING_PACKAGES: [&str; 6] = [
    "docker.io",
    "docker-doc",
    "docker-compose",
    "docker-compose-v2",
    "podman-docker",
    "containerd.io",
];

const PREREQUISITE_PACKAGES: [&str; 4] = ["apt-transport-https", "ca-certificates", "curl", "gpg"];
const KUBERNETES_PACKAGES: [&str; 3] = ["kubelet", "kubeadm", "kubectl"];

const LEGACY_APT_FILES: [&str; 2] = [
    "/usr/share/keyrings/kubernetes-archive-keyring.gpg",
    "/etc/apt/sources.list.d/kubernetes-xenial.list",
];

const FSTAB_PATH: &str = "/etc/fstab";
const RELEASE_KEY_DOWNLOAD_PATH: &str = "/etc/apt/keyrings/kubernetes-release.key";

pub async fn check_distribution(host: &mut dyn Host) -> Result<(), StepError> {
    let contents = host
        .read_file(Path::new(OS_RELEASE_PATH))?
        .ok_or_else(|| StepError::Precondition(format!("{OS_RELEASE_PATH} is missing!")))?;
    let release = OsRelease::parse(&contents).map_err(|e| {
        StepError::Precondition(format!("Couldn't parse {OS_RELEASE_PATH}: {e}"))
    })?;

    if release.id != OS_EXPECTED_ID || release.version_id != OS_EXPECTED_VERSION {
        return Err(StepError::Precondition(format!(
            "This host runs {}, only Ubuntu {OS_EXPECTED_VERSION} is supported!",
            release.describe()
        )));
    }

    debug!("Detected {}", release.describe());

    Ok(())
}

/// Comments out active swap entries. Returns `None` when nothing changes.
pub fn comment_out_swap(fstab: &str) -> Option<String> {
    let mut changed = false;
    let mut output = String::with_capacity(fstab.len() + 8);

    for line in fstab.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let is_swap = !trimmed.starts_with('#') && trimmed.split_whitespace().nth(2) == Some("swap");

        if is_swap {
            output.push('#');
            changed = true;
        }

        output.push_str(line);
    }

    changed.then_some(output)
}

pub async fn disable_swap(host: &mut dyn Host) -> Result<(), StepError> {
    host.run(&Invocation::new("swapoff").arg("-a")).await?;

    let fstab_path = Path::new(FSTAB_PATH);

    match host.read_file(fstab_path)? {
        Some(fstab) => {
            if let Some(patched) = comment_out_swap(&fstab) {
                info!("Commenting out swap entries in {FSTAB_PATH}...");
                host.write_file(fstab_path, &patched)?;
            }
        }
        None => debug!("{FSTAB_PATH} doesn't exist, nothing to patch"),
    }

    Ok(())
}

async fn is_package_installed(host: &mut dyn Host, package: &str) -> Result<bool, StepError> {
    let output = host
        .execute(&Invocation::new("dpkg-query").args(["-W", "-f=${Status}", package]))
        .await?;

    Ok(output.success && output.stdout.contains("install ok installed"))
}

pub async fn remove_conflicting_packages(host: &mut dyn Host) -> Result<(), StepError> {
    let mut installed = Vec::new();

    for package in CONFLICTING_PACKAGES {
        if is_package_installed(host, package).await? {
            installed.push(package);
        }
    }

    if installed.is_empty() {
        debug!("No conflicting packages installed");
    } else {
        info!("Purging {}...", installed.join(", "));
        host.run(&Invocation::apt_get(["purge", "-y"]).args(installed))
            .await?;
    }

    for legacy in LEGACY_APT_FILES {
        let removed = host.remove_file(Path::new(legacy));
        best_effort(host, &format!("Removing {legacy}"), removed);
    }

    Ok(())
}

pub async fn install_prerequisites(host: &mut dyn Host) -> Result<(), StepError> {
    host.run(&Invocation::apt_get(["update"])).await?;
    host.run(&Invocation::apt_get(["install", "-y"]).args(PREREQUISITE_PACKAGES))
        .await?;
    host.create_dir_all(Path::new(APT_KEYRINGS_DIR))?;

    Ok(())
}

pub async fn install_kubernetes_binaries(
    context: &RunContext,
    host: &mut dyn Host,
) -> Result<(), StepError> {
    host.run(&Invocation::new("curl").args([
        "-fsSL",
        "-o",
        RELEASE_KEY_DOWNLOAD_PATH,
        templates::kubernetes_release_key_url(context).as_str(),
    ]))
    .await?;
    host.run(&Invocation::new("gpg").args([
        "--batch",
        "--yes",
        "--dearmor",
        "-o",
        KUBERNETES_APT_KEYRING_PATH,
        RELEASE_KEY_DOWNLOAD_PATH,
    ]))
    .await?;
    let removed = host.remove_file(Path::new(RELEASE_KEY_DOWNLOAD_PATH));
    best_effort(host, "Removing the downloaded release key", removed);

    host.write_file(
        Path::new(templates::KUBERNETES_APT_SOURCE_PATH),
        &templates::kubernetes_apt_source(context),
    )?;
    host.run(&Invocation::apt_get(["update"])).await?;

    let pinned = KUBERNETES_PACKAGES
        .iter()
        .map(|p| format!("{p}={}", context.kubernetes_package_version()));

    info!("Installing kubernetes {}...", context.kubernetes_version);
    host.run(&Invocation::new("apt-mark").arg("unhold").args(KUBERNETES_PACKAGES))
        .await?;
    host.run(&Invocation::apt_get(["install", "-y"]).args(pinned))
        .await?;
    host.run(&Invocation::new("apt-mark").arg("hold").args(KUBERNETES_PACKAGES))
        .await?;

    Ok(())
}

pub async fn configure_kernel_and_sysctl(host: &mut dyn Host) -> Result<(), StepError> {
    host.write_file(Path::new(templates::MODULES_LOAD_PATH), templates::MODULES_LOAD)?;

    for module in templates::KERNEL_MODULES {
        host.run(&Invocation::new("modprobe").arg(module)).await?;
    }

    host.write_file(Path::new(templates::SYSCTL_PATH), templates::SYSCTL)?;
    host.run(&Invocation::new("sysctl").arg("--system")).await?;

    Ok(())
}

pub async fn configure_cri_shim(host: &mut dyn Host) -> Result<(), StepError> {
    host.write_file(
        Path::new(templates::CRICTL_CONFIG_PATH),
        templates::CRICTL_CONFIG,
    )?;

    Ok(())
}

pub async fn configure_kubelet_runtime(host: &mut dyn Host) -> Result<(), StepError> {
    host.write_file(
        Path::new(templates::KUBELET_DEFAULTS_PATH),
        templates::KUBELET_DEFAULTS,
    )?;

    Ok(())
}

pub async fn configure_containerd_config(host: &mut dyn Host) -> Result<(), StepError> {
    host.write_file(
        Path::new(templates::CONTAINERD_CONFIG_PATH),
        templates::CONTAINERD_CONFIG,
    )?;

    Ok(())
}

pub async fn install_containerd(context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
    // keep the config written by the previous step
    host.run(&Invocation::apt_get([
        "install",
        "-y",
        "-o",
        "Dpkg::Options::=--force-confdef",
        "-o",
        "Dpkg::Options::=--force-confold",
        format!("containerd={}", context.containerd_version).as_str(),
    ]))
    .await?;

    Ok(())
}

pub async fn start_core_services(host: &mut dyn Host) -> Result<(), StepError> {
    let commands: [&[&str]; 4] = [
        &["daemon-reload"],
        &["enable", "--now", "containerd"],
        &["restart", "containerd"],
        &["enable", "kubelet"],
    ];

    for args in commands {
        host.run(&Invocation::new("systemctl").args(args.iter().copied()))
            .await?;
    }

    Ok(())
}
