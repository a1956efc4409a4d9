//! Shell command templates executed on the managed host.
//!
//! Every value interpolated into a command goes through [`shell_quote`].

use std::borrow::Cow;

use crate::domain::instance::{ADMIN_USERNAME, DATA_DIR, SERVICE_PORT};

pub const DOCKER_INSTALL_URL: &str = "https://get.docker.com";
pub const LOG_TAIL_LINES: &str = "50";

/// Quote `value` for a POSIX shell, leaving obviously safe words bare.
#[must_use]
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

// ── Docker readiness ──────────────────────────────────────────────────────────

#[must_use]
pub fn docker_version() -> &'static str {
    "docker --version"
}

#[must_use]
pub fn docker_resolves() -> &'static str {
    "command -v docker"
}

/// Download the convenience installer to a temp file, run it with sudo and
/// remove it whatever the outcome.
#[must_use]
pub fn install_docker() -> String {
    format!(
        "f=$(mktemp) && curl -fsSL {DOCKER_INSTALL_URL} -o \"$f\" && sudo -n sh \"$f\"; rc=$?; rm -f \"$f\"; exit $rc"
    )
}

#[must_use]
pub fn start_docker_daemon() -> &'static str {
    "sudo -n systemctl start docker || sudo -n service docker start"
}

#[must_use]
pub fn add_user_to_docker_group(user: &str) -> String {
    format!("sudo -n usermod -aG docker {}", shell_quote(user))
}

// ── Docker ────────────────────────────────────────────────────────────────────

/// Parameters of the database container.
#[derive(Debug, Clone, Copy)]
pub struct RunSpec<'a> {
    pub container: &'a str,
    pub volume: &'a str,
    pub image: &'a str,
    pub bind_address: &'a str,
    pub port: u16,
    pub admin_password: &'a str,
}

/// Builder for docker invocations, optionally elevated with `sudo -n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Docker {
    sudo: bool,
}

impl Docker {
    #[must_use]
    pub const fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    #[must_use]
    pub fn uses_sudo(self) -> bool {
        self.sudo
    }

    fn command(self, args: &[&str]) -> String {
        let mut cmd = String::from(if self.sudo { "sudo -n docker" } else { "docker" });
        for arg in args {
            cmd.push(' ');
            cmd.push_str(&shell_quote(arg));
        }
        cmd
    }

    #[must_use]
    pub fn list_containers(self) -> String {
        self.command(&["ps", "-q"])
    }

    #[must_use]
    pub fn volume_inspect(self, volume: &str) -> String {
        self.command(&["volume", "inspect", volume])
    }

    #[must_use]
    pub fn volume_create(self, volume: &str) -> String {
        self.command(&["volume", "create", volume])
    }

    #[must_use]
    pub fn volume_remove(self, volume: &str) -> String {
        self.command(&["volume", "rm", volume])
    }

    #[must_use]
    pub fn image_inspect(self, image: &str) -> String {
        self.command(&["image", "inspect", image])
    }

    #[must_use]
    pub fn pull(self, image: &str) -> String {
        self.command(&["pull", image])
    }

    #[must_use]
    pub fn run_database(self, spec: &RunSpec<'_>) -> String {
        let bind = if spec.bind_address.contains(':') {
            format!("[{}]", spec.bind_address)
        } else {
            spec.bind_address.to_string()
        };
        let publish = format!("{bind}:{}:{SERVICE_PORT}", spec.port);
        let mount = format!("{}:{DATA_DIR}", spec.volume);
        let root_user = format!("MONGO_INITDB_ROOT_USERNAME={ADMIN_USERNAME}");
        let root_password = format!("MONGO_INITDB_ROOT_PASSWORD={}", spec.admin_password);
        self.command(&[
            "run",
            "-d",
            "--name",
            spec.container,
            "--restart",
            "unless-stopped",
            "-p",
            &publish,
            "-v",
            &mount,
            "-e",
            &root_user,
            "-e",
            &root_password,
            spec.image,
        ])
    }

    /// Prints `true` or `false`; fails when the container does not exist.
    #[must_use]
    pub fn inspect_running(self, container: &str) -> String {
        self.command(&["inspect", "--format", "{{.State.Running}}", container])
    }

    #[must_use]
    pub fn logs(self, container: &str) -> String {
        format!(
            "{} 2>&1",
            self.command(&["logs", "--tail", LOG_TAIL_LINES, container])
        )
    }

    #[must_use]
    pub fn remove_container(self, container: &str) -> String {
        self.command(&["rm", "-f", container])
    }

    /// Evaluate `script` with `mongosh` as the administrative user.
    #[must_use]
    pub fn mongosh_eval(self, container: &str, admin_password: &str, script: &str) -> String {
        self.command(&[
            "exec",
            container,
            "mongosh",
            "--quiet",
            "--username",
            ADMIN_USERNAME,
            "--password",
            admin_password,
            "--authenticationDatabase",
            "admin",
            "--eval",
            script,
        ])
    }

    /// Dump `database` to `archive` on the host; a failed dump removes the
    /// partial archive.
    #[must_use]
    pub fn dump(self, container: &str, admin_password: &str, database: &str, archive: &str) -> String {
        let dir = parent_dir(archive);
        let archive = shell_quote(archive);
        let exec = self.command(&[
            "exec",
            container,
            "mongodump",
            "--archive",
            "--gzip",
            "--db",
            database,
            "--username",
            ADMIN_USERNAME,
            "--password",
            admin_password,
            "--authenticationDatabase",
            "admin",
        ]);
        format!(
            "umask 077 && mkdir -p {dir} && {exec} > {archive} || {{ rc=$?; rm -f {archive}; exit $rc; }}",
            dir = shell_quote(dir),
        )
    }

    /// Stream `archive` into `mongorestore`, dropping collections of
    /// `database` before restoring them.
    #[must_use]
    pub fn restore(self, container: &str, admin_password: &str, database: &str, archive: &str) -> String {
        let ns = format!("{database}.*");
        let exec = self.command(&[
            "exec",
            "-i",
            container,
            "mongorestore",
            "--archive",
            "--gzip",
            "--drop",
            "--nsInclude",
            &ns,
            "--username",
            ADMIN_USERNAME,
            "--password",
            admin_password,
            "--authenticationDatabase",
            "admin",
        ]);
        format!("{exec} < {}", shell_quote(archive))
    }
}

/// Running-state probe that works whether or not the user needs sudo.
#[must_use]
pub fn probe_running(container: &str) -> String {
    format!(
        "{} 2>/dev/null || {} 2>/dev/null",
        Docker::new(false).inspect_running(container),
        Docker::new(true).inspect_running(container)
    )
}

// ── mongosh scripts ───────────────────────────────────────────────────────────

#[must_use]
pub fn ping_script() -> &'static str {
    "db.adminCommand({ ping: 1 }).ok"
}

/// Create `username` with `readWrite` on `database` only.
#[must_use]
pub fn create_user_script(database: &str, username: &str, password: &str) -> String {
    format!(
        "db.getSiblingDB(\"{database}\").createUser({{ user: \"{username}\", pwd: \"{password}\", roles: [{{ role: \"readWrite\", db: \"{database}\" }}] }})"
    )
}

// ── Remote files ──────────────────────────────────────────────────────────────

#[must_use]
pub fn file_exists(path: &str) -> String {
    format!("test -f {}", shell_quote(path))
}

#[must_use]
pub fn read_file(path: &str) -> String {
    format!("cat {}", shell_quote(path))
}

/// Write stdin to `path` through a sibling temp file with owner-only
/// permissions, then rename it into place. The temp file is removed when
/// any step fails.
#[must_use]
pub fn write_file_atomic(path: &str) -> String {
    let dir = shell_quote(parent_dir(path));
    let target = shell_quote(path);
    format!(
        "tmp={target}.tmp.$$; umask 077 && mkdir -p {dir} && chmod 700 {dir} && cat > \"$tmp\" && chmod 600 \"$tmp\" && mv -f \"$tmp\" {target} || {{ rc=$?; rm -f \"$tmp\"; exit $rc; }}"
    )
}

fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => ".",
    }
}
