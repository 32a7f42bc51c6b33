//! phpMyAdmin installation and web server wiring.

use std::fs;
use std::path::Path;

use log::info;

use super::webserver::{NGINX_SITE, nginx_site};
use super::StepContext;
use crate::error::ProvisionError;
use crate::fsutil::write_file_atomic;
use crate::request::{PhpVersion, Stack};
use crate::service;
use crate::system::{Invocation, run_checked};

const INSTALL_DIR: &str = "/usr/share/phpmyadmin";
const TEMP_DIR: &str = "/var/lib/phpmyadmin/tmp";
const APACHE_CONF: &str = "etc/apache2/conf-available/phpmyadmin.conf";
const NGINX_SNIPPET: &str = "etc/nginx/snippets/phpmyadmin.conf";

fn blowfish_secret() -> String {
    std::iter::repeat_with(fastrand::alphanumeric).take(32).collect()
}

pub(super) fn config_inc(secret: &str) -> String {
    format!(
        "<?php
declare(strict_types=1);

$cfg['blowfish_secret'] = '{secret}';

$i = 0;
$i++;
$cfg['Servers'][$i]['auth_type'] = 'cookie';
$cfg['Servers'][$i]['host'] = 'localhost';
$cfg['Servers'][$i]['compress'] = false;
$cfg['Servers'][$i]['AllowNoPassword'] = false;

$cfg['UploadDir'] = '';
$cfg['SaveDir'] = '';
$cfg['TempDir'] = '{TEMP_DIR}';
"
    )
}

fn apache_conf() -> String {
    format!(
        "Alias /phpmyadmin {INSTALL_DIR}

<Directory {INSTALL_DIR}>
    Options SymLinksIfOwnerMatch
    DirectoryIndex index.php
    Require all granted
</Directory>

<Directory {INSTALL_DIR}/setup>
    Require all denied
</Directory>
"
    )
}

fn nginx_snippet(php: PhpVersion) -> String {
    format!(
        "location /phpmyadmin {{
    root /usr/share/;
    index index.php index.html index.htm;

    location ~ ^/phpmyadmin/(.+\\.php)$ {{
        root /usr/share/;
        fastcgi_pass unix:{socket};
        fastcgi_index index.php;
        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        include fastcgi_params;
    }}

    location ~* ^/phpmyadmin/(.+\\.(jpg|jpeg|gif|css|png|js|ico|html|xml|txt))$ {{
        root /usr/share/;
    }}
}}
",
        socket = php.fpm_socket()
    )
}

pub(super) fn install(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    let Some(php) = ctx.request.php else {
        return Ok(());
    };
    for tool in ["php", "mysql"] {
        if !ctx.system.command_exists(tool) {
            return Err(ProvisionError::Verification(format!(
                "phpMyAdmin requires {tool}, which is not installed"
            )));
        }
    }

    info!("Installing phpMyAdmin");
    let download = tempfile::tempdir().map_err(|e| ProvisionError::io(std::env::temp_dir(), e))?;
    let archive = download.path().join("phpmyadmin.tar.gz");
    ctx.system.fetch(&ctx.settings.phpmyadmin_url, &archive)?;

    let target = ctx.settings.under_root(INSTALL_DIR);
    ctx.system.extract_tar_gz(&archive, &target, 1)?;

    write_file_atomic(
        &target.join("config.inc.php"),
        &config_inc(&blowfish_secret()),
        0o644,
    )?;

    let temp_dir = ctx.settings.under_root(TEMP_DIR);
    fs::create_dir_all(&temp_dir).map_err(|e| ProvisionError::io(&temp_dir, e))?;
    run_checked(
        ctx.system,
        &Invocation::new("chown")
            .args(["-R", "www-data:www-data"])
            .arg(path_arg(&temp_dir)),
    )?;

    match ctx.request.stack {
        Stack::Lamp => {
            write_file_atomic(&ctx.settings.under_root(APACHE_CONF), &apache_conf(), 0o644)?;
            run_checked(ctx.system, &Invocation::new("a2enconf").arg("phpmyadmin"))?;
            run_checked(ctx.system, &Invocation::new("apache2ctl").arg("configtest"))?;
            service::restart_or_fail(ctx.system, "apache2", ctx.restart)
        }
        Stack::Lemp => {
            write_file_atomic(
                &ctx.settings.under_root(NGINX_SNIPPET),
                &nginx_snippet(php),
                0o644,
            )?;
            write_file_atomic(
                &ctx.settings.under_root(NGINX_SITE),
                &nginx_site(Some(php), true),
                0o644,
            )?;
            run_checked(ctx.system, &Invocation::new("nginx").arg("-t"))?;
            service::restart_or_fail(ctx.system, "nginx", ctx.restart)
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_secret_and_temp_dir() {
        let secret = blowfish_secret();
        assert_eq!(secret.len(), 32);
        let config = config_inc(&secret);
        assert!(config.contains(&format!("'blowfish_secret'] = '{secret}'")));
        assert!(config.contains("/var/lib/phpmyadmin/tmp"));
    }

    #[test]
    fn nginx_snippet_uses_fpm_socket() {
        let snippet = nginx_snippet(PhpVersion::V8_3);
        assert!(snippet.contains("unix:/run/php/php8.3-fpm.sock"));
        assert_eq!(snippet.matches('{').count(), snippet.matches('}').count());
    }

    #[test]
    fn apache_conf_denies_setup() {
        let conf = apache_conf();
        assert!(conf.starts_with("Alias /phpmyadmin /usr/share/phpmyadmin"));
        assert!(conf.contains("/usr/share/phpmyadmin/setup>\n    Require all denied"));
    }
}
