use crate::package::{base_mentions, PackageManager};
use std::fmt::Write as _;

/// Default Ubuntu mirror prefix; `ports` and `archive` are appended.
pub const DEFAULT_UBUNTU_MIRROR: &str = "mirror.aarnet.edu.au/pub/ubuntu";

const PROMPT_HOSTNAME: &str = "neurobuilder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Host and path prefix replacing the stock Ubuntu archives, or `None`
    /// to keep the image's sources untouched.
    pub ubuntu_mirror: Option<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            ubuntu_mirror: Some(DEFAULT_UBUNTU_MIRROR.to_owned()),
        }
    }
}

fn sed_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('/', "\\/").replace('&', "\\&")
}

/// Render the Singularity definition used to bootstrap the sandbox.
pub fn render_definition(base: &str, pm: PackageManager, options: &TemplateOptions) -> String {
    let mut def = String::new();
    let _ = writeln!(def, "BootStrap: docker");
    let _ = writeln!(def, "From: {base}");
    def.push_str("%post -c /bin/bash\n");
    def.push_str("  set -ex\n");
    def.push_str("  touch /etc/localtime\n");
    def.push_str("  CUSTOM_ENV=/.singularity.d/env/99-zz_custom_env.sh\n");
    def.push_str("  cat >$CUSTOM_ENV <<EOF\n");
    def.push_str("#!/bin/bash\n");
    let _ = writeln!(def, "PS1='\\u@{PROMPT_HOSTNAME}:\\w\\$ '");
    def.push_str("EOF\n");
    def.push_str("  chmod 755 $CUSTOM_ENV\n");

    if base_mentions(base, "ubuntu") {
        if let Some(mirror) = options.ubuntu_mirror.as_deref().filter(|m| !m.is_empty()) {
            let mirror = sed_escape(mirror.trim_end_matches('/'));
            let _ = writeln!(
                def,
                "  sed -i -e 's/ports.ubuntu.com\\/ubuntu-ports/{mirror}\\/ports/g' /etc/apt/sources.list"
            );
            let _ = writeln!(
                def,
                "  sed -i -e 's/archive.ubuntu.com\\/ubuntu/{mirror}\\/archive/g' /etc/apt/sources.list"
            );
        }
    }

    let _ = writeln!(def, "  {}", pm.update_command());
    def
}
