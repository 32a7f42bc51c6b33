//! Apache / Nginx installation.

use log::info;

use super::StepContext;
use crate::error::ProvisionError;
use crate::fsutil::write_file_atomic;
use crate::packages;
use crate::request::{PhpVersion, Stack};
use crate::service;
use crate::system::{Invocation, run_checked};

pub(super) const NGINX_SITE: &str = "etc/nginx/sites-available/default";

/// Default Nginx server block, optionally handing PHP to php-fpm and
/// including the phpMyAdmin snippet.
pub fn nginx_site(php: Option<PhpVersion>, admin_ui: bool) -> String {
    let index = if php.is_some() {
        "index.php index.html index.htm"
    } else {
        "index.html index.htm"
    };

    let mut site = format!(
        "server {{
    listen 80 default_server;
    listen [::]:80 default_server;

    root /var/www/html;
    index {index};
    server_name _;

    location / {{
        try_files $uri $uri/ =404;
    }}
"
    );

    if let Some(version) = php {
        site.push_str(&format!(
            "
    location ~ \\.php$ {{
        include snippets/fastcgi-php.conf;
        fastcgi_pass unix:{};
    }}
",
            version.fpm_socket()
        ));
    }

    if admin_ui {
        site.push_str("\n    include snippets/phpmyadmin.conf;\n");
    }

    site.push_str(
        "
    location ~ /\\.ht {
        deny all;
    }
}
",
    );
    site
}

pub(super) fn install(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    match ctx.request.stack {
        Stack::Lamp => install_apache(ctx),
        Stack::Lemp => install_nginx(ctx),
    }
}

fn install_apache(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    info!("Installing Apache");
    packages::install(ctx.system, &["apache2".to_string()])?;
    run_checked(ctx.system, &Invocation::new("a2enmod").arg("rewrite"))?;
    run_checked(ctx.system, &Invocation::new("apache2ctl").arg("configtest"))?;
    service::start_and_enable(ctx.system, "apache2")?;
    service::restart_or_fail(ctx.system, "apache2", ctx.restart)
}

fn install_nginx(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    info!("Installing Nginx");
    packages::install(ctx.system, &["nginx".to_string()])?;
    write_file_atomic(
        &ctx.settings.under_root(NGINX_SITE),
        &nginx_site(ctx.request.php, false),
        0o644,
    )?;
    run_checked(ctx.system, &Invocation::new("nginx").arg("-t"))?;
    service::start_and_enable(ctx.system, "nginx")?;
    service::restart_or_fail(ctx.system, "nginx", ctx.restart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn php_site_points_at_fpm_socket() {
        let site = nginx_site(Some(PhpVersion::V8_1), false);
        assert!(site.contains("fastcgi_pass unix:/run/php/php8.1-fpm.sock;"));
        assert!(site.contains("index index.php"));
        assert!(!site.contains("phpmyadmin"));
    }

    #[test]
    fn static_site_has_no_php_location() {
        let site = nginx_site(None, false);
        assert!(!site.contains("fastcgi_pass"));
        assert!(site.contains("index index.html index.htm;"));
        assert_eq!(site.matches('{').count(), site.matches('}').count());
    }

    #[test]
    fn admin_ui_snippet_is_included() {
        let site = nginx_site(Some(PhpVersion::V8_2), true);
        assert!(site.contains("include snippets/phpmyadmin.conf;"));
        assert_eq!(site.matches('{').count(), site.matches('}').count());
    }
}
