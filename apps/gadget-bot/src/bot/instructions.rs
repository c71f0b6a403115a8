use crate::models::Platform;

const WINDOWS: &str = "\
🖥 Setting up WireGuard on Windows:

1. Download and install WireGuard from https://www.wireguard.com/install/
2. Open WireGuard
3. Click \"Import tunnel(s) from file\"
4. Select the configuration file below
5. Click \"Activate\"

Done! You are connected 🎉";

const MACOS: &str = "\
🍎 Setting up WireGuard on macOS:

1. Install WireGuard from the App Store or https://www.wireguard.com/install/
2. Open WireGuard
3. Choose File → Import tunnel(s) from file
4. Select the configuration file below
5. Click \"Activate\"

Done! You are connected 🎉";

const LINUX: &str = "\
🐧 Setting up WireGuard on Linux:

1. Install WireGuard:
   Ubuntu/Debian: sudo apt install wireguard
   Fedora: sudo dnf install wireguard-tools
2. Save the configuration below as /etc/wireguard/wg0.conf
3. Bring the tunnel up: sudo wg-quick up wg0
4. Start it on boot: sudo systemctl enable wg-quick@wg0

Done! You are connected 🎉";

const IOS: &str = "\
📱 Setting up WireGuard on iOS:

1. Install WireGuard from the App Store
2. Open the app and tap \"+\"
3. Choose \"Create from file or archive\" and pick the configuration file below,
   or \"Create from QR code\" and scan a QR code made from the link below
4. Tap \"Allow\" to add the VPN configuration
5. Turn the switch on

Done! You are connected 🎉";

const ANDROID: &str = "\
🤖 Setting up WireGuard on Android:

1. Install WireGuard from Google Play
2. Open the app and tap \"+\"
3. Choose \"Import from file or archive\" and pick the configuration file below,
   or \"Scan from QR code\" and scan a QR code made from the link below
4. Allow the VPN connection request
5. Turn the switch on

Done! You are connected 🎉";

pub fn instructions(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => WINDOWS,
        Platform::MacOs => MACOS,
        Platform::Linux => LINUX,
        Platform::Ios => IOS,
        Platform::Android => ANDROID,
    }
}
