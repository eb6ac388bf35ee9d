//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use dcia::core::{is_xml_filename, output_filename};

    #[test]
    fn language_suffix() {
        assert_eq!(output_filename("test.xml", "en"), "test_en.xml");
    }

    #[test]
    fn task_suffix() {
        assert_eq!(output_filename("cours.xml", "corrected"), "cours_corrected.xml");
    }

    #[test]
    fn keeps_last_extension_only() {
        assert_eq!(output_filename("module.v2.xml", "ar"), "module.v2_ar.xml");
    }

    #[test]
    fn keeps_extension_case() {
        assert_eq!(output_filename("COURS.XML", "fr"), "COURS_fr.XML");
    }

    #[test]
    fn no_extension() {
        assert_eq!(output_filename("README", "en"), "README_en");
    }

    #[test]
    fn xml_extension_is_case_insensitive() {
        assert!(is_xml_filename("a.xml"));
        assert!(is_xml_filename("dir/B.XML"));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use dcia::core::is_xml_filename;

    #[test]
    fn other_extensions() {
        assert!(!is_xml_filename("notes.txt"));
        assert!(!is_xml_filename("archive.xml.zip"));
    }

    #[test]
    fn no_extension() {
        assert!(!is_xml_filename("xml"));
        assert!(!is_xml_filename(""));
    }
}
