fn main() {
    overlay_calib_lib::run()
}
