pub fn render_password_reset(reset_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Reset Password</h2>
    <p>You are receiving this email because we received a password reset request for your account.</p>
    <p><a href="{reset_url}" style="display: inline-block; padding: 10px 20px; background: #2d3748; color: white; text-decoration: none; border-radius: 4px;">Reset Password</a></p>
    <p style="color: #666; font-size: 14px;">If you did not request a password reset, no further action is required.</p>
</body>
</html>"#
    )
}

pub fn render_verify_email(verify_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Verify Email Address</h2>
    <p>Please click the button below to verify your email address.</p>
    <p><a href="{verify_url}" style="display: inline-block; padding: 10px 20px; background: #2d3748; color: white; text-decoration: none; border-radius: 4px;">Verify Email Address</a></p>
    <p style="color: #666; font-size: 14px;">If you did not create an account, no further action is required.</p>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_the_link() {
        let url = "http://localhost/reset-password?token=abc&email=a%40b.com";
        assert!(render_password_reset(url).contains(url));
        assert!(render_verify_email(url).contains(url));
    }
}
